//! Best-effort delivery to the remote collection service
//!
//! One POST per event. No retry, no queue: a failed send is reported to the
//! caller and forgotten.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::registry::SinkDescriptor;
use super::types::Payload;
use super::DeliverySink;
use crate::error::BridgeError;

/// JSON-over-HTTP delivery sink
#[derive(Clone)]
pub struct HttpDelivery {
    http: Client,
}

impl HttpDelivery {
    /// Build a client with a per-request timeout.
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }

    /// Shared with the camera uploader.
    pub fn client(&self) -> &Client {
        &self.http
    }
}

#[async_trait]
impl DeliverySink for HttpDelivery {
    async fn deliver(
        &self,
        descriptor: &SinkDescriptor,
        payload: &Payload,
    ) -> Result<StatusCode, BridgeError> {
        debug!("POST {} ({})", descriptor.url, descriptor.kind);

        let resp = self
            .http
            .post(&descriptor.url)
            .json(payload)
            .send()
            .await
            .map_err(|source| BridgeError::Transport {
                url: descriptor.url.clone(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Status {
                url: descriptor.url.clone(),
                status,
                body,
            });
        }

        Ok(status)
    }
}
