//! Object storage for generated artifacts.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::config::StorageConfig;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("storage write failed: {0}")]
    Io(String),
}

/// Trait for artifact storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store an artifact under `key` and return its public content URL.
    async fn store(
        &self,
        key: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError>;

    fn store_name(&self) -> &'static str;
}

/// Filesystem-backed object store.
///
/// Writes artifacts under `root_dir` and returns URLs under
/// `public_base_url`, which a CDN or static file server is expected to
/// serve.
pub struct FsObjectStore {
    config: StorageConfig,
}

impl FsObjectStore {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    fn validate_key(key: &str) -> Result<(), StorageError> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn store(
        &self,
        key: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        Self::validate_key(key)?;

        let path = self.config.root_dir.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io(e.to_string()))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        debug!(key, content_type, bytes = data.len(), "artifact stored");

        Ok(format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            key
        ))
    }

    fn store_name(&self) -> &'static str {
        "fs"
    }
}
