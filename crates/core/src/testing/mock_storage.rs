//! Mock object store for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::storage::{ObjectStore, StorageError};

/// A stored artifact for test assertions.
#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Mock implementation of the ObjectStore trait, keeping artifacts in memory.
pub struct MockObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredArtifact>>>,
    next_error: Arc<RwLock<Option<String>>>,
}

impl Default for MockObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Fail the next store call with this message.
    pub async fn fail_next(&self, message: impl Into<String>) {
        *self.next_error.write().await = Some(message.into());
    }

    /// Retrieve a stored artifact by key.
    pub async fn get(&self, key: &str) -> Option<StoredArtifact> {
        self.objects.read().await.get(key).cloned()
    }

    /// Number of stored artifacts.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn store(
        &self,
        key: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        if let Some(message) = self.next_error.write().await.take() {
            return Err(StorageError::Io(message));
        }

        self.objects.write().await.insert(
            key.to_string(),
            StoredArtifact {
                content_type: content_type.to_string(),
                data: data.to_vec(),
            },
        );
        Ok(format!("http://mock-storage/{}", key))
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stores_and_returns_url() {
        let store = MockObjectStore::new();
        let url = store
            .store("creations/j/result.json", "application/json", b"{}")
            .await
            .unwrap();
        assert_eq!(url, "http://mock-storage/creations/j/result.json");

        let artifact = store.get("creations/j/result.json").await.unwrap();
        assert_eq!(artifact.content_type, "application/json");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_fail_next() {
        let store = MockObjectStore::new();
        store.fail_next("disk full").await;
        let err = store.store("k", "text/plain", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(store.is_empty().await);
    }
}
