use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{User, UserProfile};
use crate::services::{ConfirmationPrompt, Decision, Outcome};
use crate::session::{AdminSession, EditSlot, OperationPolicy};
use crate::store::{DocumentStore, UserStore};

#[derive(Debug, Clone, PartialEq)]
pub struct UserDeleteRequest {
    pub user_id: String,
    pub prompt: ConfirmationPrompt,
}

/// User profile management. Creating login credentials happens at the
/// identity provider; this only maintains the `users` profile documents.
pub struct UserService {
    store: UserStore,
    policy: OperationPolicy,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, policy: OperationPolicy) -> Self {
        Self {
            store: UserStore::new(store),
            policy,
        }
    }

    pub async fn list_users(&self) -> AppResult<Vec<User>> {
        self.policy
            .run("list users", self.store.list_users())
            .await
            .inspect_err(|e| tracing::error!("Error fetching users: {}", e))
    }

    pub async fn get_user(&self, id: &str) -> AppResult<User> {
        self.policy
            .run("get user", self.store.get_user(id))
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn add_user(&self, session: &AdminSession, profile: &UserProfile) -> AppResult<User> {
        let profile = profile.normalized()?;
        let _guard = session.begin(EditSlot::User)?;

        let id = self
            .policy
            .run("add user", self.store.create_user(&profile))
            .await
            .inspect_err(|e| tracing::error!("Failed to add user: {}", e))?;
        tracing::info!("User added: id={}, by={}", id, session.user().user_id);

        Ok(User {
            id,
            name: profile.name,
            email: profile.email,
            phone_number: profile.phone_number,
            role: profile.role,
        })
    }

    pub async fn update_user(
        &self,
        session: &AdminSession,
        id: &str,
        profile: &UserProfile,
    ) -> AppResult<()> {
        let profile = profile.normalized()?;
        let _guard = session.begin(EditSlot::User)?;

        self.policy
            .run("update user", self.store.update_user(id, &profile))
            .await
            .inspect_err(|e| tracing::error!("Failed to update user {}: {}", id, e))?;
        tracing::info!("User updated: id={}, by={}", id, session.user().user_id);
        Ok(())
    }

    pub async fn prepare_delete(&self, id: &str) -> AppResult<UserDeleteRequest> {
        let user = self.get_user(id).await?;
        Ok(UserDeleteRequest {
            user_id: user.id.clone(),
            prompt: ConfirmationPrompt {
                title: "Are you sure you want to delete this user?".to_string(),
                details: vec![
                    format!("Name: {}", user.name),
                    format!("Email: {}", user.email),
                    format!("Role: {}", user.role_label()),
                ],
            },
        })
    }

    pub async fn delete_user(
        &self,
        session: &AdminSession,
        request: &UserDeleteRequest,
        decision: Decision,
    ) -> AppResult<Outcome> {
        if decision == Decision::Declined {
            return Ok(Outcome::Declined);
        }
        if request.user_id == session.user().user_id {
            return Err(AppError::Conflict(
                "Operators cannot delete their own account".to_string(),
            ));
        }
        let _guard = session.begin(EditSlot::User)?;
        self.policy
            .run("delete user", self.store.delete_user(&request.user_id))
            .await
            .inspect_err(|e| tracing::error!("Failed to delete user {}: {}", request.user_id, e))?;
        tracing::info!("User deleted: id={}", request.user_id);
        Ok(Outcome::Applied)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::{AuthenticatedUser, Role};
    use crate::store::MemoryDocumentStore;

    fn admin_session() -> AdminSession {
        AdminSession::establish(Some(AuthenticatedUser {
            user_id: "admin-1".into(),
            role: Role::Admin,
        }))
        .unwrap()
    }

    fn profile(name: &str, role: i64) -> UserProfile {
        UserProfile {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone_number: "555-0100".into(),
            role,
        }
    }

    fn service() -> (Arc<MemoryDocumentStore>, UserService) {
        let memory = Arc::new(MemoryDocumentStore::new());
        let service = UserService::new(memory.clone(), OperationPolicy::new(Duration::from_secs(2)));
        (memory, service)
    }

    #[tokio::test]
    async fn test_add_then_edit_user() {
        let (_, service) = service();
        let session = admin_session();

        let added = service.add_user(&session, &profile(" Ada ", 0)).await.unwrap();
        assert_eq!(added.name, "Ada");
        assert_eq!(added.role_label(), "Pending");

        service
            .update_user(&session, &added.id, &profile("Ada", 1))
            .await
            .unwrap();
        let stored = service.get_user(&added.id).await.unwrap();
        assert_eq!(stored.role_label(), "User");
        assert_eq!(service.list_users().await.unwrap(), vec![stored]);
    }

    #[tokio::test]
    async fn test_invalid_profile_writes_nothing() {
        let (_, service) = service();
        let session = admin_session();
        let err = service
            .add_user(&session, &profile("Ada", 12))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        assert!(service.list_users().await.unwrap().is_empty());

        let err = service
            .update_user(&session, "ghost", &profile("Bob", 1))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_is_gated() {
        let (_, service) = service();
        let session = admin_session();
        let added = service.add_user(&session, &profile("Bob", 2)).await.unwrap();

        let request = service.prepare_delete(&added.id).await.unwrap();
        assert_eq!(request.prompt.details[2], "Role: Blocked");
        let outcome = service
            .delete_user(&session, &request, Decision::Declined)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Declined);
        assert!(service.get_user(&added.id).await.is_ok());

        service
            .delete_user(&session, &request, Decision::Accepted)
            .await
            .unwrap();
        assert!(service.get_user(&added.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_operator_cannot_delete_self() {
        let (memory, service) = service();
        let session = admin_session();
        let path = crate::store::CollectionPath::root(crate::store::USERS).unwrap();
        let own = serde_json::json!({
            "name": "Root",
            "email": "root@example.com",
            "phoneNumber": "1",
            "role": 3
        });
        memory
            .insert_with_id(&path, "admin-1", own.as_object().cloned().unwrap())
            .await;

        let request = service.prepare_delete("admin-1").await.unwrap();
        let err = service
            .delete_user(&session, &request, Decision::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(service.get_user("admin-1").await.is_ok());
    }
}
