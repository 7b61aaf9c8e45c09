use super::store::BlobStore;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque snapshot version. Equal tokens imply byte-identical payloads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct VersionToken(pub String);

impl VersionToken {
    /// Generates a fresh UUID v4-based token, unique across writers with high probability.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a conditional snapshot read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The stored token equals the caller's; the payload was not downloaded.
    Unchanged,
    /// A newer snapshot exists.
    Changed { data: Vec<u8>, token: VersionToken },
    /// Nothing has been published under this path yet.
    Missing,
}

/// Blob store wrapper that pairs every payload with a version lock object.
#[derive(Clone)]
pub struct VersionedSnapshotStore {
    blobs: Arc<dyn BlobStore>,
}

impl VersionedSnapshotStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Name of the lock object guarding `path`.
    pub fn lock_path(path: &str) -> String {
        format!("{}.lock", path)
    }

    /// Reads the lock first and only downloads the payload when the token moved.
    ///
    /// A payload without a lock is treated as missing: its writer has not finished.
    /// The payload may be newer than the returned token if a writer raced this read;
    /// the caller then simply refetches next time, it never holds a fresh token with
    /// stale data.
    pub async fn read_if_changed(
        &self,
        path: &str,
        last_token: Option<&VersionToken>,
    ) -> Result<ReadOutcome> {
        let lock = match self.blobs.get(&Self::lock_path(path)).await? {
            Some(lock) => VersionToken(String::from_utf8(lock)?),
            None => return Ok(ReadOutcome::Missing),
        };

        if last_token == Some(&lock) {
            tracing::trace!("Snapshot {} unchanged at {}", path, lock);
            return Ok(ReadOutcome::Unchanged);
        }

        match self.blobs.get(path).await? {
            Some(data) => {
                tracing::debug!("Fetched snapshot {} at {} ({} bytes)", path, lock, data.len());
                Ok(ReadOutcome::Changed { data, token: lock })
            }
            None => {
                tracing::warn!("Snapshot {} has lock {} but no payload", path, lock);
                Ok(ReadOutcome::Missing)
            }
        }
    }

    /// Publishes `data` under `path`, then its `token`.
    pub async fn write(&self, path: &str, data: Vec<u8>, token: &VersionToken) -> Result<()> {
        let size = data.len();
        self.blobs.put(path, data).await?;
        self.blobs
            .put(&Self::lock_path(path), token.0.clone().into_bytes())
            .await?;

        tracing::info!("Published snapshot {} at {} ({} bytes)", path, token, size);
        Ok(())
    }
}
