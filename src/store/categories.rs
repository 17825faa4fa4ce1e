use std::sync::Arc;

use serde_json::Value;

use crate::error::AppResult;
use crate::models::{Category, Subcategory};

use super::{decode_valid, CollectionPath, DocumentStore, Fields, CATEGORIES, SUBCATEGORIES};

/// Category and subcategory documents. Subcategories are always addressed
/// through their parent category id.
#[derive(Clone)]
pub struct CategoryStore {
    store: Arc<dyn DocumentStore>,
}

impl CategoryStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn categories() -> AppResult<CollectionPath> {
        CollectionPath::root(CATEGORIES)
    }

    fn subcategories(category_id: &str) -> AppResult<CollectionPath> {
        CollectionPath::nested(CATEGORIES, category_id, SUBCATEGORIES)
    }

    fn name_fields(key: &str, name: &str) -> Fields {
        let mut fields = Fields::new();
        fields.insert(key.to_string(), Value::String(name.to_string()));
        fields
    }

    /// Decodable categories; malformed documents are logged and skipped.
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let docs = self.store.list(&Self::categories()?).await?;
        Ok(decode_valid("category", &docs))
    }

    pub async fn get_category(&self, id: &str) -> AppResult<Option<Category>> {
        match self.store.get(&Self::categories()?, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn create_category(&self, name: &str) -> AppResult<String> {
        self.store
            .create(&Self::categories()?, Self::name_fields("categoryName", name))
            .await
    }

    pub async fn update_category(&self, id: &str, name: &str) -> AppResult<()> {
        self.store
            .update(&Self::categories()?, id, Self::name_fields("categoryName", name))
            .await
    }

    pub async fn delete_category(&self, id: &str) -> AppResult<()> {
        self.store.delete(&Self::categories()?, id).await
    }

    pub async fn list_subcategories(&self, category_id: &str) -> AppResult<Vec<Subcategory>> {
        let docs = self.store.list(&Self::subcategories(category_id)?).await?;
        Ok(decode_valid("subcategory", &docs))
    }

    /// Ids of every document under the category, decodable or not.
    pub async fn subcategory_ids(&self, category_id: &str) -> AppResult<Vec<String>> {
        let docs = self.store.list(&Self::subcategories(category_id)?).await?;
        Ok(docs.into_iter().map(|doc| doc.id).collect())
    }

    pub async fn get_subcategory(
        &self,
        category_id: &str,
        id: &str,
    ) -> AppResult<Option<Subcategory>> {
        match self.store.get(&Self::subcategories(category_id)?, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn create_subcategory(&self, category_id: &str, name: &str) -> AppResult<String> {
        self.store
            .create(
                &Self::subcategories(category_id)?,
                Self::name_fields("subCategoryName", name),
            )
            .await
    }

    pub async fn update_subcategory(
        &self,
        category_id: &str,
        id: &str,
        name: &str,
    ) -> AppResult<()> {
        self.store
            .update(
                &Self::subcategories(category_id)?,
                id,
                Self::name_fields("subCategoryName", name),
            )
            .await
    }

    pub async fn delete_subcategory(&self, category_id: &str, id: &str) -> AppResult<()> {
        self.store
            .delete(&Self::subcategories(category_id)?, id)
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryDocumentStore;

    #[tokio::test]
    async fn test_subcategories_scoped_to_parent() {
        let store = CategoryStore::new(Arc::new(MemoryDocumentStore::new()));

        let electronics = store.create_category("Electronics").await.unwrap();
        let books = store.create_category("Books").await.unwrap();
        let phones = store
            .create_subcategory(&electronics, "Phones")
            .await
            .unwrap();

        let subs = store.list_subcategories(&electronics).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].id, phones);
        assert_eq!(subs[0].sub_category_name, "Phones");

        assert!(store.list_subcategories(&books).await.unwrap().is_empty());
        assert!(store
            .get_subcategory(&books, &phones)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete_category() {
        let store = CategoryStore::new(Arc::new(MemoryDocumentStore::new()));
        let id = store.create_category("Electronic").await.unwrap();

        store.update_category(&id, "Electronics").await.unwrap();
        let category = store.get_category(&id).await.unwrap().unwrap();
        assert_eq!(category.category_name, "Electronics");
        assert_eq!(category.id, id);

        store.delete_category(&id).await.unwrap();
        assert!(store.get_category(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listings_skip_malformed_documents() {
        let memory = Arc::new(MemoryDocumentStore::new());
        let store = CategoryStore::new(memory.clone());
        let electronics = store.create_category("Electronics").await.unwrap();
        store.create_subcategory(&electronics, "Phones").await.unwrap();

        let legacy = json!({ "name": "legacy" });
        memory
            .insert_with_id(
                &CategoryStore::categories().unwrap(),
                "legacy",
                legacy.as_object().cloned().unwrap(),
            )
            .await;
        let numeric = json!({ "subCategoryName": 5 });
        memory
            .insert_with_id(
                &CategoryStore::subcategories(&electronics).unwrap(),
                "numeric",
                numeric.as_object().cloned().unwrap(),
            )
            .await;

        let categories = store.list_categories().await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].category_name, "Electronics");

        let subs = store.list_subcategories(&electronics).await.unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].sub_category_name, "Phones");

        let ids = store.subcategory_ids(&electronics).await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&"numeric".to_string()));
    }
}
