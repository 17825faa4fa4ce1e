// Document store abstraction shared by the Postgres and in-memory backends

pub mod categories;
pub mod items;
pub mod memory;
pub mod reports;
pub mod users;

pub use categories::CategoryStore;
pub use items::ItemStore;
pub use memory::MemoryDocumentStore;
pub use reports::ReportStore;
pub use users::UserStore;

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{AppError, AppResult};

/// Top-level fields of a stored document.
pub type Fields = serde_json::Map<String, Value>;

pub const CATEGORIES: &str = "itemCategories";
pub const SUBCATEGORIES: &str = "subCategories";
pub const ITEMS: &str = "itemsOnSale";
pub const REPORTS: &str = "reportsRequests";
pub const USERS: &str = "users";

/// Slash-separated collection address, e.g. `itemCategories/{id}/subCategories`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionPath(String);

impl CollectionPath {
    pub fn root(name: &str) -> AppResult<Self> {
        validate_segment(name)?;
        Ok(Self(name.to_string()))
    }

    pub fn nested(parent: &str, parent_id: &str, child: &str) -> AppResult<Self> {
        for segment in [parent, parent_id, child] {
            validate_segment(segment)?;
        }
        Ok(Self(format!("{}/{}/{}", parent, parent_id, child)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn validate_segment(segment: &str) -> AppResult<()> {
    if segment.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "collection path segment must not be empty".to_string(),
        ));
    }
    if segment.contains('/') {
        return Err(AppError::InvalidInput(format!(
            "collection path segment must not contain '/': {}",
            segment
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Decodes the document into a model; the id is injected as field `id`.
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<T> {
        let mut fields = self.fields.clone();
        fields.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| AppError::InvalidRecord(format!("document {}: {}", self.id, e)))
    }
}

/// Decodes every document that fits `T`; the rest are logged and skipped.
pub fn decode_valid<T: DeserializeOwned>(kind: &str, docs: &[Document]) -> Vec<T> {
    docs.iter()
        .filter_map(|doc| match doc.decode::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Skipping {} {}: {}", kind, doc.id, e);
                None
            }
        })
        .collect()
}

/// Serializes a payload into document fields, dropping any `id` key.
pub fn to_fields<T: Serialize>(payload: &T) -> AppResult<Fields> {
    match serde_json::to_value(payload)? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(AppError::Internal(format!(
            "payload did not serialize to an object: {}",
            other
        ))),
    }
}

/// Generic document CRUD over named (possibly nested) collections.
///
/// `get` returning `Ok(None)` is the expected outcome for an absent
/// document; errors are reserved for transport or permission failures.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents of a collection, ordered by id.
    async fn list(&self, collection: &CollectionPath) -> AppResult<Vec<Document>>;

    async fn get(&self, collection: &CollectionPath, id: &str) -> AppResult<Option<Document>>;

    /// Inserts a document under a freshly generated id and returns that id.
    async fn create(&self, collection: &CollectionPath, fields: Fields) -> AppResult<String>;

    /// Merges `fields` into an existing document. Fails with `NotFound` when absent.
    async fn update(&self, collection: &CollectionPath, id: &str, fields: Fields) -> AppResult<()>;

    /// Removes a document. Deleting an absent document is not an error.
    async fn delete(&self, collection: &CollectionPath, id: &str) -> AppResult<()>;
}

pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct Named {
        id: String,
        category_name: String,
    }

    #[test]
    fn test_nested_path() {
        let path = CollectionPath::nested(CATEGORIES, "c1", SUBCATEGORIES).unwrap();
        assert_eq!(path.as_str(), "itemCategories/c1/subCategories");
    }

    #[test]
    fn test_path_rejects_bad_segments() {
        assert!(CollectionPath::nested(CATEGORIES, "", SUBCATEGORIES).is_err());
        assert!(CollectionPath::nested(CATEGORIES, "a/b", SUBCATEGORIES).is_err());
        assert!(CollectionPath::root(" ").is_err());
    }

    #[test]
    fn test_decode_injects_id() {
        let mut fields = Fields::new();
        fields.insert("categoryName".into(), json!("Electronics"));
        let doc = Document {
            id: "c1".into(),
            fields,
        };
        let named: Named = doc.decode().unwrap();
        assert_eq!(
            named,
            Named {
                id: "c1".into(),
                category_name: "Electronics".into()
            }
        );
    }

    #[test]
    fn test_decode_failure_is_invalid_record() {
        let doc = Document {
            id: "c1".into(),
            fields: Fields::new(),
        };
        let err = doc.decode::<Named>().unwrap_err();
        assert!(matches!(err, AppError::InvalidRecord(_)));
    }

    #[test]
    fn test_document_ids_are_unique() {
        assert_ne!(new_document_id(), new_document_id());
    }
}
