//! Local JSON persistence

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::registry::SinkDescriptor;
use super::types::{file_timestamp, Payload};
use super::PersistenceSink;
use crate::error::BridgeError;

/// Upper bound on `-n` disambiguators tried within one second.
const MAX_SUFFIX: u32 = 10_000;

/// Writes each payload as a pretty-printed JSON document under the sink's
/// directory.
#[derive(Debug, Clone, Default)]
pub struct JsonFileSink;

impl JsonFileSink {
    pub fn new() -> Self {
        Self
    }
}

/// `{stamp}_{label}_data_.json`, or `{stamp}-{n}_{label}_data_.json` for n > 0.
pub fn file_name(stamp: &str, label: &str, n: u32) -> String {
    if n == 0 {
        format!("{}_{}_data_.json", stamp, label)
    } else {
        format!("{}-{}_{}_data_.json", stamp, n, label)
    }
}

/// Create a new file, never replacing an existing one. Returns the open file
/// and its path.
async fn create_unique(
    dir: &Path,
    stamp: &str,
    label: &str,
) -> Result<(tokio::fs::File, PathBuf), BridgeError> {
    let mut n = 0;
    loop {
        let path = dir.join(file_name(stamp, label, n));
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && n < MAX_SUFFIX => {
                debug!("{} exists, trying next suffix", path.display());
                n += 1;
            }
            Err(source) => return Err(BridgeError::Persistence { path, source }),
        }
    }
}

/// Write and fsync a document into a freshly created file. On failure the
/// partial file is removed so no truncated JSON is left behind.
async fn write_document(
    mut file: tokio::fs::File,
    path: &Path,
    json: &[u8],
) -> Result<(), BridgeError> {
    let write = async {
        file.write_all(json).await?;
        file.sync_all().await
    };
    let result = write.await;
    if let Err(source) = result {
        drop(file);
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Could not remove partial file {}: {}", path.display(), e);
        }
        return Err(BridgeError::Persistence {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

#[async_trait]
impl PersistenceSink for JsonFileSink {
    async fn persist(
        &self,
        descriptor: &SinkDescriptor,
        payload: &Payload,
    ) -> Result<PathBuf, BridgeError> {
        let json = serde_json::to_vec_pretty(payload)?;
        let stamp = file_timestamp(payload.captured_at);

        let (file, path) = create_unique(&descriptor.dir, &stamp, descriptor.label).await?;
        write_document(file, &path, &json).await?;

        info!("Saved {} payload to {}", descriptor.kind, path.display());
        Ok(path)
    }
}
