use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

use super::{BlobRef, StorageBackend};

/// Bucket kept in memory. Used when no storage backend is configured and in tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    bucket: String,
    keys: RwLock<Vec<String>>,
    unavailable: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    pub async fn put(&self, key: impl Into<String>) {
        self.keys.write().await.push(key.into());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Storage("blob store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBlobStore {
    async fn list(&self, prefix: &str) -> AppResult<Vec<BlobRef>> {
        self.check()?;
        Ok(self
            .keys
            .read()
            .await
            .iter()
            .filter(|key| key.starts_with(prefix))
            .map(BlobRef::new)
            .collect())
    }

    async fn resolve_url(&self, blob: &BlobRef) -> AppResult<String> {
        self.check()?;
        Ok(format!("memory://{}/{}", self.bucket, blob.key))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
