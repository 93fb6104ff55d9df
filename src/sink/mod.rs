//! Event sinks
//!
//! Every event that has a [`SinkDescriptor`] goes to two independent sinks:
//! a local JSON store and the remote collection service. Neither waits on
//! the other and neither failure is fatal.

pub mod delivery;
pub mod persist;
pub mod registry;
pub mod types;

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::error::BridgeError;
use registry::SinkDescriptor;
use types::Payload;

/// Durable local copy of a payload
#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Write the payload under the descriptor's directory, returning the
    /// file created.
    async fn persist(
        &self,
        descriptor: &SinkDescriptor,
        payload: &Payload,
    ) -> Result<PathBuf, BridgeError>;
}

/// Single send attempt of a payload to the descriptor's endpoint
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(
        &self,
        descriptor: &SinkDescriptor,
        payload: &Payload,
    ) -> Result<StatusCode, BridgeError>;
}
