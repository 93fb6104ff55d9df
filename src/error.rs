use std::path::PathBuf;

use thiserror::Error;

/// Failures the bridge reports per event or per stream.
///
/// Only [`BridgeError::Stream`] ends the dispatch loop. Everything else is
/// logged by whoever spawned the work and then dropped.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to persist {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("delivery to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("delivery to {url} rejected with status {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("controller link failed: {0}")]
    Stream(#[source] std::io::Error),

    #[error("image capture failed: {0}")]
    Capture(String),
}
