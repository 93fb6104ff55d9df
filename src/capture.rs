//! Camera capture collaborator
//!
//! Invoked by the debounce timer once the door has settled. The image itself
//! comes from an external still-capture tool (`fswebcam`, `libcamera-still`,
//! ...) so the bridge never links against a camera stack.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{error, info};

use crate::error::BridgeError;
use crate::sink::types::{file_timestamp, iso_timestamp};

/// Token in the capture command replaced by the output path.
pub const OUTPUT_TOKEN: &str = "{output}";

/// Acquire an image, store it and upload it. Failures stay inside.
#[async_trait]
pub trait CaptureCollaborator: Send + Sync {
    async fn capture_persist_and_deliver(&self);
}

pub struct CameraCapture {
    command: Vec<String>,
    device_id: String,
    pictures_dir: PathBuf,
    url: String,
    http: Client,
}

impl CameraCapture {
    pub fn new(
        command: &str,
        device_id: &str,
        pictures_dir: &Path,
        url: &str,
        http: Client,
    ) -> Self {
        Self {
            command: command.split_whitespace().map(str::to_string).collect(),
            device_id: device_id.to_string(),
            pictures_dir: pictures_dir.to_path_buf(),
            url: url.to_string(),
            http,
        }
    }

    /// Run the capture command, writing to `output`.
    async fn capture(&self, output: &Path) -> Result<(), BridgeError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| BridgeError::Capture("capture command is empty".to_string()))?;

        let output_str = output.to_string_lossy();
        let args: Vec<String> = args
            .iter()
            .map(|a| a.replace(OUTPUT_TOKEN, &output_str))
            .collect();

        let result = tokio::process::Command::new(program)
            .args(&args)
            .output()
            .await
            .map_err(|e| BridgeError::Capture(format!("failed to run {}: {}", program, e)))?;

        if !result.status.success() {
            return Err(BridgeError::Capture(format!(
                "{} exited with {}: {}",
                program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(BridgeError::Capture(format!(
                "{} produced no image at {}",
                program,
                output.display()
            )));
        }

        Ok(())
    }

    async fn upload(&self, image: &Path, stamp: &str) -> Result<(), BridgeError> {
        let bytes = tokio::fs::read(image)
            .await
            .map_err(|source| BridgeError::Persistence {
                path: image.to_path_buf(),
                source,
            })?;

        let transport = |source| BridgeError::Transport {
            url: self.url.clone(),
            source,
        };

        let part = Part::bytes(bytes)
            .file_name(format!("{}_{}.jpg", self.device_id, stamp))
            .mime_str("image/jpeg")
            .map_err(transport)?;

        let form = Form::new()
            .part("image", part)
            .text("deviceId", self.device_id.clone())
            .text("timestamp", iso_timestamp(Utc::now()));

        let resp = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(BridgeError::Status {
                url: self.url.clone(),
                status,
                body,
            });
        }

        info!("Server accepted picture: {}", status);
        Ok(())
    }
}

#[async_trait]
impl CaptureCollaborator for CameraCapture {
    async fn capture_persist_and_deliver(&self) {
        let stamp = file_timestamp(Utc::now());
        let image = self.pictures_dir.join(format!("{}_picture.jpg", stamp));

        if let Err(e) = self.capture(&image).await {
            error!("Failed to capture image: {}", e);
            return;
        }
        info!("Captured image: {}", image.display());

        if let Err(e) = self.upload(&image, &stamp).await {
            error!("Image upload failed: {}", e);
        }
    }
}

/// Used when the camera is disabled in config.
pub struct NoCamera;

#[async_trait]
impl CaptureCollaborator for NoCamera {
    async fn capture_persist_and_deliver(&self) {
        info!("Capture requested but camera is disabled");
    }
}
