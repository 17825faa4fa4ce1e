// Storage abstraction for GCS and R2 backends

pub mod gcs;
pub mod memory;
pub mod r2;

pub use gcs::GcsBackend;
pub use memory::MemoryBlobStore;
pub use r2::R2Backend;

use async_trait::async_trait;

use crate::error::AppResult;

/// Reference to a stored object, as returned by a listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BlobRef {
    pub key: String,
}

impl BlobRef {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// True for an object directly under `prefix`. Folder placeholders
    /// (`prefix/`) and keys in nested folders do not count.
    pub fn is_file_under(&self, prefix: &str) -> bool {
        self.key
            .strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
    }
}

/// Blob listing backend (GCS / R2 share this interface)
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Objects whose key starts with `prefix`, in any order. Backends list
    /// with a `/` delimiter, so nested folders are not descended into.
    async fn list(&self, prefix: &str) -> AppResult<Vec<BlobRef>>;

    /// A URL a browser can fetch the object from.
    async fn resolve_url(&self, blob: &BlobRef) -> AppResult<String>;

    fn bucket(&self) -> &str;
}

/// Key prefix under which an item's photos are stored.
pub fn item_images_prefix(item_id: &str) -> String {
    format!("itemImages/{}/", item_id)
}
