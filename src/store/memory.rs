use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

use super::{new_document_id, CollectionPath, Document, DocumentStore, Fields};

/// In-memory document store for development and tests.
///
/// Carries fault knobs so callers can exercise transport failures and
/// slow responses without a live database.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<CollectionPath, BTreeMap<String, Fields>>>,
    unavailable: AtomicBool,
    fail_writes: AtomicBool,
    latency_ms: AtomicU64,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails with a store error while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// create/update/delete fail with a permission error while set.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Delay applied before every call.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Stores a document under a caller-chosen id, replacing any existing one.
    pub async fn insert_with_id(&self, collection: &CollectionPath, id: &str, fields: Fields) {
        self.collections
            .write()
            .await
            .entry(collection.clone())
            .or_default()
            .insert(id.to_string(), fields);
    }

    async fn before_call(&self, write: bool) -> AppResult<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::Store("document store unavailable".to_string()));
        }
        if write && self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Store("permission denied".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn list(&self, collection: &CollectionPath) -> AppResult<Vec<Document>> {
        self.before_call(false).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, fields)| Document {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(&self, collection: &CollectionPath, id: &str) -> AppResult<Option<Document>> {
        self.before_call(false).await?;
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|fields| Document {
                id: id.to_string(),
                fields: fields.clone(),
            }))
    }

    async fn create(&self, collection: &CollectionPath, fields: Fields) -> AppResult<String> {
        self.before_call(true).await?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.clone()).or_default();
        let mut id = new_document_id();
        while docs.contains_key(&id) {
            id = new_document_id();
        }
        docs.insert(id.clone(), fields);
        tracing::debug!("memory store create: collection={}, id={}", collection, id);
        Ok(id)
    }

    async fn update(&self, collection: &CollectionPath, id: &str, fields: Fields) -> AppResult<()> {
        self.before_call(true).await?;
        let mut collections = self.collections.write().await;
        let existing = collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| AppError::NotFound(format!("{}/{} not found", collection, id)))?;
        for (key, value) in fields {
            existing.insert(key, value);
        }
        tracing::debug!("memory store update: collection={}, id={}", collection, id);
        Ok(())
    }

    async fn delete(&self, collection: &CollectionPath, id: &str) -> AppResult<()> {
        self.before_call(true).await?;
        let mut collections = self.collections.write().await;
        if let Some(docs) = collections.get_mut(collection) {
            docs.remove(id);
        }
        tracing::debug!("memory store delete: collection={}, id={}", collection, id);
        Ok(())
    }
}
