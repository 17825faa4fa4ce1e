use std::sync::Arc;

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{ItemListing, ItemStatus, ItemUpdate};

use super::{to_fields, CollectionPath, Document, DocumentStore, Fields, ITEMS};

/// Item listing documents in `itemsOnSale`.
#[derive(Clone)]
pub struct ItemStore {
    store: Arc<dyn DocumentStore>,
}

impl ItemStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn items() -> AppResult<CollectionPath> {
        CollectionPath::root(ITEMS)
    }

    /// Raw documents, for callers that decide how to treat undecodable records.
    pub async fn list_documents(&self) -> AppResult<Vec<Document>> {
        self.store.list(&Self::items()?).await
    }

    pub async fn get_item(&self, id: &str) -> AppResult<Option<ItemListing>> {
        match self.store.get(&Self::items()?, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Writes every editable field in a single document update.
    pub async fn update_item(&self, id: &str, update: &ItemUpdate) -> AppResult<()> {
        let fields = to_fields(update)?;
        self.store
            .update(&Self::items()?, id, fields)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Item not found".to_string()),
                other => other,
            })
    }

    /// Writes only `itemStatus`.
    pub async fn set_status(&self, id: &str, status: ItemStatus) -> AppResult<()> {
        let mut fields = Fields::new();
        fields.insert("itemStatus".to_string(), Value::from(status.code()));
        self.store
            .update(&Self::items()?, id, fields)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Item not found".to_string()),
                other => other,
            })
    }

    pub async fn delete_item(&self, id: &str) -> AppResult<()> {
        self.store.delete(&Self::items()?, id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryDocumentStore;

    fn listing_fields() -> Fields {
        json!({
            "itemName": "Phone",
            "itemPrice": 120,
            "itemBrand": "Acme",
            "itemCategory": "c1",
            "itemSubCategory": "s1",
            "itemCountry": "Germany",
            "itemCity": "Berlin",
            "itemTown": "Mitte",
            "itemDistrict": "Central",
            "itemStreet": "Main 1",
            "itemDate": "2024-03-05T14:07:09Z",
            "itemDesc": "Barely used",
            "itemStatus": 0
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[tokio::test]
    async fn test_set_status_touches_only_status() {
        let memory = Arc::new(MemoryDocumentStore::new());
        let path = CollectionPath::root(ITEMS).unwrap();
        memory.insert_with_id(&path, "i1", listing_fields()).await;
        let store = ItemStore::new(memory.clone());

        store.set_status("i1", ItemStatus::Blocked).await.unwrap();

        let doc = memory.get(&path, "i1").await.unwrap().unwrap();
        let mut expected = listing_fields();
        expected.insert("itemStatus".into(), json!(2));
        assert_eq!(doc.fields, expected);
    }

    #[tokio::test]
    async fn test_missing_item_is_not_found() {
        let store = ItemStore::new(Arc::new(MemoryDocumentStore::new()));
        assert!(store.get_item("nope").await.unwrap().is_none());
        let err = store
            .set_status("nope", ItemStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(m) if m == "Item not found"));
    }

    #[tokio::test]
    async fn test_integer_price_decodes() {
        let memory = Arc::new(MemoryDocumentStore::new());
        let path = CollectionPath::root(ITEMS).unwrap();
        memory.insert_with_id(&path, "i1", listing_fields()).await;
        let store = ItemStore::new(memory);

        let item = store.get_item("i1").await.unwrap().unwrap();
        assert_eq!(item.item_price, 120.0);
        assert_eq!(item.item_status, ItemStatus::Pending);
    }
}
