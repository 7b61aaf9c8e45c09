//! Blob Store Backends
//!
//! The durable object store is an external collaborator; this module only fixes its
//! interface (`get`/`put`/`list` of named byte blobs) and ships two backends:
//! `MemoryBlobStore` for single-process runs and tests, `FsBlobStore` for several
//! processes sharing one directory.

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Component, Path, PathBuf};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Returns the blob stored under `path`, or `None` if it does not exist.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Replaces the blob stored under `path`.
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Lists the names of all blobs whose name starts with `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(path).map(|entry| entry.value().clone()))
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.blobs.insert(path.to_string(), data);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .blobs
            .iter()
            .filter(|entry| entry.key().starts_with(prefix))
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Stores each blob as a file below `root`, using `/`-separated names as relative paths.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, name: &str) -> Result<PathBuf> {
        let relative = Path::new(name);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if name.is_empty() || !is_plain {
            return Err(anyhow::anyhow!("Invalid blob name: {:?}", name));
        }

        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let file = self.resolve(path)?;

        match tokio::fs::read(&file).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Failed to read {}: {}", file.display(), e)),
        }
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let file = self.resolve(path)?;

        if let Some(parent) = file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename so concurrent readers never see a torn file.
        let staging = file.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&staging, &data).await?;
        tokio::fs::rename(&staging, &file).await?;

        tracing::debug!("Stored blob {} ({} bytes)", path, data.len());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let name = relative
                    .components()
                    .map(|component| component.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");

                if name.starts_with(prefix) && !name.contains(".tmp-") {
                    names.push(name);
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
