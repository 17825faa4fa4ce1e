use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{User, UserProfile};

use super::{decode_valid, to_fields, CollectionPath, DocumentStore, USERS};

/// User profile documents in `users`.
#[derive(Clone)]
pub struct UserStore {
    store: Arc<dyn DocumentStore>,
}

impl UserStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn users() -> AppResult<CollectionPath> {
        CollectionPath::root(USERS)
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        let docs = self.store.list(&Self::users()?).await?;
        Ok(decode_valid("user", &docs))
    }

    pub async fn get_user(&self, id: &str) -> AppResult<Option<User>> {
        match self.store.get(&Self::users()?, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn create_user(&self, profile: &UserProfile) -> AppResult<String> {
        self.store
            .create(&Self::users()?, to_fields(profile)?)
            .await
    }

    /// Overwrites the profile fields; other fields on the document are kept.
    pub async fn update_user(&self, id: &str, profile: &UserProfile) -> AppResult<()> {
        self.store
            .update(&Self::users()?, id, to_fields(profile)?)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("User not found".to_string()),
                other => other,
            })
    }

    pub async fn delete_user(&self, id: &str) -> AppResult<()> {
        self.store.delete(&Self::users()?, id).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::MemoryDocumentStore;

    fn profile(name: &str) -> UserProfile {
        UserProfile {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone_number: "555-0100".into(),
            role: 1,
        }
    }

    #[tokio::test]
    async fn test_update_keeps_unrelated_fields() {
        let memory = Arc::new(MemoryDocumentStore::new());
        let store = UserStore::new(memory.clone());
        let path = UserStore::users().unwrap();
        let legacy = json!({
            "name": "Ada",
            "email": "ada@example.com",
            "phoneNumber": "1",
            "role": 0,
            "createdBy": "signup"
        });
        memory
            .insert_with_id(&path, "u1", legacy.as_object().cloned().unwrap())
            .await;

        store.update_user("u1", &profile("Ada")).await.unwrap();
        let doc = memory.get(&path, "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields["role"], 1);
        assert_eq!(doc.fields["createdBy"], "signup");

        let err = store.update_user("ghost", &profile("Bob")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_skips_documents_without_a_role() {
        let memory = Arc::new(MemoryDocumentStore::new());
        let store = UserStore::new(memory.clone());
        store.create_user(&profile("Ada")).await.unwrap();
        let broken = json!({ "name": "Nobody" });
        memory
            .insert_with_id(
                &UserStore::users().unwrap(),
                "broken",
                broken.as_object().cloned().unwrap(),
            )
            .await;

        let users = store.list_users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Ada");
    }
}
