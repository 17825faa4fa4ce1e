use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{normalize_name, Category, Subcategory};
use crate::session::{AdminSession, CancelToken, EditSlot, OperationPolicy};
use crate::store::{CategoryStore, DocumentStore};

pub const UNKNOWN_NAME: &str = "Unknown";

/// What deleting a category does to the subcategories it still owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryDeletePolicy {
    /// Refuse while any subcategory exists.
    #[default]
    Restrict,
    /// Delete every subcategory first, then the category.
    Cascade,
}

impl FromStr for CategoryDeletePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restrict" => Ok(CategoryDeletePolicy::Restrict),
            "cascade" => Ok(CategoryDeletePolicy::Cascade),
            other => Err(AppError::InvalidInput(format!(
                "unknown category delete policy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubcategoryListing {
    pub category_id: String,
    pub subcategories: Vec<Subcategory>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDeletion {
    pub subcategories_removed: usize,
}

/// Last successfully fetched taxonomy, used to resolve display names.
#[derive(Debug, Default)]
struct TaxonomyLookup {
    categories: Vec<Category>,
    subcategories: HashMap<String, Vec<Subcategory>>,
}

pub struct CategoryService {
    store: CategoryStore,
    policy: OperationPolicy,
    delete_policy: CategoryDeletePolicy,
    lookup: RwLock<TaxonomyLookup>,
}

impl CategoryService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        policy: OperationPolicy,
        delete_policy: CategoryDeletePolicy,
    ) -> Self {
        Self {
            store: CategoryStore::new(store),
            policy,
            delete_policy,
            lookup: RwLock::new(TaxonomyLookup::default()),
        }
    }

    pub fn delete_policy(&self) -> CategoryDeletePolicy {
        self.delete_policy
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories = self
            .policy
            .run("list categories", self.store.list_categories())
            .await
            .inspect_err(|e| tracing::error!("Error fetching categories: {}", e))?;
        self.lookup.write().await.categories = categories.clone();
        Ok(categories)
    }

    /// Categories as of the last successful fetch.
    pub async fn cached_categories(&self) -> Vec<Category> {
        self.lookup.read().await.categories.clone()
    }

    /// On failure the previously cached list for `category_id` is kept and
    /// the error is returned; callers must not treat the cache as fresh.
    pub async fn list_subcategories(&self, category_id: &str) -> AppResult<Vec<Subcategory>> {
        let subcategories = self
            .policy
            .run("list subcategories", self.store.list_subcategories(category_id))
            .await
            .inspect_err(|e| {
                tracing::error!("Error fetching subcategories of {}: {}", category_id, e)
            })?;
        self.cache_subcategories(category_id, &subcategories).await;
        Ok(subcategories)
    }

    /// Same fetch as [`list_subcategories`](Self::list_subcategories), abandoned when `cancel` fires.
    pub async fn fetch_subcategories(
        &self,
        category_id: &str,
        cancel: &CancelToken,
    ) -> AppResult<Vec<Subcategory>> {
        let subcategories = self
            .policy
            .run_cancellable(
                "list subcategories",
                cancel,
                self.store.list_subcategories(category_id),
            )
            .await
            .inspect_err(|e| {
                tracing::error!("Error fetching subcategories of {}: {}", category_id, e)
            })?;
        self.cache_subcategories(category_id, &subcategories).await;
        Ok(subcategories)
    }

    /// Puts `category_id` in focus and loads its subcategories. Fails with
    /// `Cancelled` when another category was focused before the fetch returned.
    pub async fn expand_category(
        &self,
        session: &AdminSession,
        category_id: &str,
        cancel: &CancelToken,
    ) -> AppResult<SubcategoryListing> {
        let ticket = session.focus_category(category_id);
        let subcategories = self.fetch_subcategories(category_id, cancel).await?;
        if !session.is_current(&ticket) {
            tracing::debug!("Discarding subcategories of {}: focus moved", category_id);
            return Err(AppError::Cancelled(
                "superseded by a newer category selection".to_string(),
            ));
        }
        Ok(SubcategoryListing {
            category_id: ticket.category_id().to_string(),
            subcategories,
        })
    }

    pub async fn get_category(&self, id: &str) -> AppResult<Category> {
        self.policy
            .run("get category", self.store.get_category(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    pub async fn get_subcategory(&self, category_id: &str, id: &str) -> AppResult<Subcategory> {
        self.policy
            .run("get subcategory", self.store.get_subcategory(category_id, id))
            .await?
            .ok_or_else(|| AppError::NotFound("Subcategory not found".to_string()))
    }

    /// Loads a category for editing. A missing document is reported as
    /// `NotFound`, distinct from a failed fetch.
    pub async fn begin_edit_category(&self, id: &str) -> AppResult<Category> {
        self.get_category(id).await.inspect_err(|e| {
            if e.is_not_found() {
                tracing::warn!("Category document not found: {}", id);
            } else {
                tracing::error!("Error fetching category {}: {}", id, e);
            }
        })
    }

    pub async fn begin_edit_subcategory(
        &self,
        category_id: &str,
        id: &str,
    ) -> AppResult<Subcategory> {
        self.get_subcategory(category_id, id).await.inspect_err(|e| {
            if e.is_not_found() {
                tracing::warn!("Subcategory document not found: {}/{}", category_id, id);
            } else {
                tracing::error!("Error fetching subcategory {}/{}: {}", category_id, id, e);
            }
        })
    }

    pub async fn create_category(&self, session: &AdminSession, name: &str) -> AppResult<Category> {
        let name = normalize_name("category", name)?;
        let _guard = session.begin(EditSlot::Category)?;

        let id = self
            .policy
            .run("create category", self.store.create_category(&name))
            .await
            .inspect_err(|e| tracing::error!("Failed to add category: {}", e))?;
        tracing::info!(
            "Category added: id={}, name={}, by={}",
            id,
            name,
            session.user().user_id
        );

        self.refresh_categories().await;
        Ok(Category {
            id,
            category_name: name,
        })
    }

    pub async fn update_category(
        &self,
        session: &AdminSession,
        id: &str,
        name: &str,
    ) -> AppResult<()> {
        let name = normalize_name("category", name)?;
        let _guard = session.begin(EditSlot::Category)?;

        self.policy
            .run("update category", self.store.update_category(id, &name))
            .await
            .map_err(|e| not_found_as(e, "Category not found"))
            .inspect_err(|e| tracing::error!("Failed to update category {}: {}", id, e))?;
        tracing::info!("Category updated: id={}, name={}", id, name);

        self.refresh_categories().await;
        Ok(())
    }

    /// Deletes a category according to the configured [`CategoryDeletePolicy`].
    pub async fn delete_category(
        &self,
        session: &AdminSession,
        id: &str,
    ) -> AppResult<CategoryDeletion> {
        let _guard = session.begin(EditSlot::Category)?;

        // raw ids so malformed subcategory documents are counted and removed too
        let owned = self
            .policy
            .run("list subcategories", self.store.subcategory_ids(id))
            .await
            .inspect_err(|e| tracing::error!("Failed to delete category {}: {}", id, e))?;

        if !owned.is_empty() && self.delete_policy == CategoryDeletePolicy::Restrict {
            tracing::warn!(
                "Refusing to delete category {}: {} subcategories remain",
                id,
                owned.len()
            );
            return Err(AppError::Conflict(format!(
                "Category still has {} subcategories; delete them first",
                owned.len()
            )));
        }

        for subcategory_id in &owned {
            self.policy
                .run(
                    "delete subcategory",
                    self.store.delete_subcategory(id, subcategory_id),
                )
                .await
                .inspect_err(|e| {
                    tracing::error!(
                        "Cascade delete of subcategory {}/{} failed: {}",
                        id,
                        subcategory_id,
                        e
                    )
                })?;
        }

        self.policy
            .run("delete category", self.store.delete_category(id))
            .await
            .inspect_err(|e| tracing::error!("Failed to delete category {}: {}", id, e))?;
        tracing::info!(
            "Category deleted: id={}, subcategories_removed={}",
            id,
            owned.len()
        );

        self.lookup.write().await.subcategories.remove(id);
        self.refresh_categories().await;
        Ok(CategoryDeletion {
            subcategories_removed: owned.len(),
        })
    }

    pub async fn create_subcategory(
        &self,
        session: &AdminSession,
        category_id: &str,
        name: &str,
    ) -> AppResult<Subcategory> {
        let name = normalize_name("subcategory", name)?;
        let _guard = session.begin(EditSlot::Subcategory)?;

        // never create a subcategory under a category that no longer exists
        self.get_category(category_id).await?;

        let id = self
            .policy
            .run(
                "create subcategory",
                self.store.create_subcategory(category_id, &name),
            )
            .await
            .inspect_err(|e| tracing::error!("Failed to add subcategory: {}", e))?;
        tracing::info!(
            "Subcategory added: category={}, id={}, name={}",
            category_id,
            id,
            name
        );

        self.refresh_subcategories(category_id).await;
        Ok(Subcategory {
            id,
            sub_category_name: name,
        })
    }

    pub async fn update_subcategory(
        &self,
        session: &AdminSession,
        category_id: &str,
        id: &str,
        name: &str,
    ) -> AppResult<()> {
        let name = normalize_name("subcategory", name)?;
        let _guard = session.begin(EditSlot::Subcategory)?;

        self.policy
            .run(
                "update subcategory",
                self.store.update_subcategory(category_id, id, &name),
            )
            .await
            .map_err(|e| not_found_as(e, "Subcategory not found"))
            .inspect_err(|e| {
                tracing::error!("Failed to update subcategory {}/{}: {}", category_id, id, e)
            })?;
        tracing::info!(
            "Subcategory updated: category={}, id={}, name={}",
            category_id,
            id,
            name
        );

        self.refresh_subcategories(category_id).await;
        Ok(())
    }

    pub async fn delete_subcategory(
        &self,
        session: &AdminSession,
        category_id: &str,
        id: &str,
    ) -> AppResult<()> {
        let _guard = session.begin(EditSlot::Subcategory)?;

        self.policy
            .run(
                "delete subcategory",
                self.store.delete_subcategory(category_id, id),
            )
            .await
            .inspect_err(|e| {
                tracing::error!("Failed to delete subcategory {}/{}: {}", category_id, id, e)
            })?;
        tracing::info!("Subcategory deleted: category={}, id={}", category_id, id);

        self.refresh_subcategories(category_id).await;
        Ok(())
    }

    /// Loads subcategory tables for categories not cached yet. Failures are
    /// logged and leave those names unresolved.
    pub async fn ensure_subcategories_loaded<'a, I>(&self, category_ids: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for category_id in category_ids {
            if category_id.is_empty()
                || self
                    .lookup
                    .read()
                    .await
                    .subcategories
                    .contains_key(category_id)
            {
                continue;
            }
            // errors are already logged by list_subcategories
            let _ = self.list_subcategories(category_id).await;
        }
    }

    pub async fn category_name(&self, id: &str) -> String {
        self.lookup
            .read()
            .await
            .categories
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.category_name.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }

    pub async fn subcategory_name(&self, category_id: &str, id: &str) -> String {
        self.lookup
            .read()
            .await
            .subcategories
            .get(category_id)
            .and_then(|subs| subs.iter().find(|s| s.id == id))
            .map(|s| s.sub_category_name.clone())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    }

    /// Checks against the store that `subcategory_id` lives under `category_id`.
    pub async fn ensure_subcategory_belongs(
        &self,
        category_id: &str,
        subcategory_id: &str,
    ) -> AppResult<()> {
        match self.get_category(category_id).await {
            Ok(_) => {}
            Err(AppError::NotFound(_)) => {
                return Err(AppError::InvalidInput(format!(
                    "category {} does not exist",
                    category_id
                )))
            }
            Err(e) => return Err(e),
        }
        match self.get_subcategory(category_id, subcategory_id).await {
            Ok(_) => Ok(()),
            Err(AppError::NotFound(_)) => Err(AppError::InvalidInput(format!(
                "subcategory {} does not belong to category {}",
                subcategory_id, category_id
            ))),
            Err(e) => Err(e),
        }
    }

    async fn cache_subcategories(&self, category_id: &str, subcategories: &[Subcategory]) {
        self.lookup
            .write()
            .await
            .subcategories
            .insert(category_id.to_string(), subcategories.to_vec());
    }

    async fn refresh_categories(&self) {
        // failure is logged by list_categories; the write itself succeeded
        let _ = self.list_categories().await;
    }

    async fn refresh_subcategories(&self, category_id: &str) {
        let _ = self.list_subcategories(category_id).await;
    }
}

fn not_found_as(err: AppError, message: &str) -> AppError {
    match err {
        AppError::NotFound(_) => AppError::NotFound(message.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::session::{AuthenticatedUser, Role};
    use crate::store::{CollectionPath, DocumentStore, MemoryDocumentStore, CATEGORIES, SUBCATEGORIES};

    fn admin_session() -> AdminSession {
        AdminSession::establish(Some(AuthenticatedUser {
            user_id: "admin-1".into(),
            role: Role::Admin,
        }))
        .unwrap()
    }

    fn service_with(
        delete_policy: CategoryDeletePolicy,
    ) -> (Arc<MemoryDocumentStore>, CategoryService) {
        let memory = Arc::new(MemoryDocumentStore::new());
        let service = CategoryService::new(memory.clone(), OperationPolicy::default(), delete_policy);
        (memory, service)
    }

    #[tokio::test]
    async fn test_create_subcategory_assigns_fresh_id() {
        let (_, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();
        let electronics = service.create_category(&session, "Electronics").await.unwrap();

        let mut seen = Vec::new();
        for name in ["Phones", "Laptops", "Phones"] {
            let created = service
                .create_subcategory(&session, &electronics.id, name)
                .await
                .unwrap();
            assert!(!seen.contains(&created.id));
            seen.push(created.id.clone());

            let listed = service.list_subcategories(&electronics.id).await.unwrap();
            assert!(listed
                .iter()
                .any(|s| s.id == created.id && s.sub_category_name == name));
        }
    }

    #[tokio::test]
    async fn test_mutations_refresh_lookup_tables() {
        let (_, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();

        let category = service.create_category(&session, " Electronics ").await.unwrap();
        assert_eq!(category.category_name, "Electronics");
        assert_eq!(service.category_name(&category.id).await, "Electronics");

        service
            .update_category(&session, &category.id, "Gadgets")
            .await
            .unwrap();
        assert_eq!(service.category_name(&category.id).await, "Gadgets");

        let phones = service
            .create_subcategory(&session, &category.id, "Phones")
            .await
            .unwrap();
        assert_eq!(
            service.subcategory_name(&category.id, &phones.id).await,
            "Phones"
        );
        assert_eq!(service.subcategory_name("other", &phones.id).await, UNKNOWN_NAME);
        assert_eq!(service.category_name("missing").await, UNKNOWN_NAME);
    }

    #[tokio::test]
    async fn test_begin_edit_distinguishes_not_found_from_failure() {
        let (memory, service) = service_with(CategoryDeletePolicy::Restrict);

        let err = service.begin_edit_category("missing").await.unwrap_err();
        assert!(matches!(&err, AppError::NotFound(m) if m == "Category not found"));

        memory.set_unavailable(true);
        let err = service.begin_edit_category("missing").await.unwrap_err();
        assert!(matches!(err, AppError::Store(_)));
    }

    #[tokio::test]
    async fn test_failed_subcategory_fetch_keeps_last_known_good() {
        let (memory, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();
        let category = service.create_category(&session, "Electronics").await.unwrap();
        let phones = service
            .create_subcategory(&session, &category.id, "Phones")
            .await
            .unwrap();

        memory.set_unavailable(true);
        assert!(service.list_subcategories(&category.id).await.is_err());
        assert_eq!(
            service.subcategory_name(&category.id, &phones.id).await,
            "Phones"
        );
    }

    #[tokio::test]
    async fn test_restrict_policy_refuses_delete_with_subcategories() {
        let (_, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();
        let c1 = service.create_category(&session, "Electronics").await.unwrap();
        let s1 = service
            .create_subcategory(&session, &c1.id, "Phones")
            .await
            .unwrap();

        let err = service.delete_category(&session, &c1.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let subs = service.list_subcategories(&c1.id).await.unwrap();
        assert_eq!(subs, vec![s1.clone()]);
        assert!(service.get_category(&c1.id).await.is_ok());

        service
            .delete_subcategory(&session, &c1.id, &s1.id)
            .await
            .unwrap();
        let deletion = service.delete_category(&session, &c1.id).await.unwrap();
        assert_eq!(deletion.subcategories_removed, 0);
        assert!(service.get_category(&c1.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_cascade_policy_removes_subcategories() {
        let (_, service) = service_with(CategoryDeletePolicy::Cascade);
        let session = admin_session();
        let c1 = service.create_category(&session, "Electronics").await.unwrap();
        service
            .create_subcategory(&session, &c1.id, "Phones")
            .await
            .unwrap();
        service
            .create_subcategory(&session, &c1.id, "Tablets")
            .await
            .unwrap();

        let deletion = service.delete_category(&session, &c1.id).await.unwrap();
        assert_eq!(deletion.subcategories_removed, 2);
        assert!(service.list_subcategories(&c1.id).await.unwrap().is_empty());
        assert!(service.cached_categories().await.is_empty());
    }

    async fn seed_malformed_subcategory(memory: &MemoryDocumentStore, category_id: &str) {
        let path = CollectionPath::nested(CATEGORIES, category_id, SUBCATEGORIES).unwrap();
        let numeric = serde_json::json!({ "subCategoryName": 5 });
        memory
            .insert_with_id(&path, "numeric", numeric.as_object().cloned().unwrap())
            .await;
    }

    #[tokio::test]
    async fn test_cascade_removes_malformed_subcategories() {
        let (memory, service) = service_with(CategoryDeletePolicy::Cascade);
        let session = admin_session();
        let c1 = service.create_category(&session, "Electronics").await.unwrap();
        service
            .create_subcategory(&session, &c1.id, "Phones")
            .await
            .unwrap();
        seed_malformed_subcategory(&memory, &c1.id).await;
        assert_eq!(service.list_subcategories(&c1.id).await.unwrap().len(), 1);

        let deletion = service.delete_category(&session, &c1.id).await.unwrap();
        assert_eq!(deletion.subcategories_removed, 2);
        let path = CollectionPath::nested(CATEGORIES, &c1.id, SUBCATEGORIES).unwrap();
        assert!(memory.list(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restrict_counts_malformed_subcategories() {
        let (memory, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();
        let c1 = service.create_category(&session, "Electronics").await.unwrap();
        seed_malformed_subcategory(&memory, &c1.id).await;
        assert!(service.list_subcategories(&c1.id).await.unwrap().is_empty());

        let err = service.delete_category(&session, &c1.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert!(service.get_category(&c1.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_subcategory_needs_existing_parent() {
        let (_, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();
        let err = service
            .create_subcategory(&session, "ghost", "Phones")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_blank_names_rejected() {
        let (_, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();
        let err = service.create_category(&session, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_concurrent_category_submit_is_busy() {
        let (_, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();
        let _in_flight = session.begin(EditSlot::Category).unwrap();

        let err = service
            .create_category(&session, "Electronics")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Busy(_)));
    }

    #[tokio::test]
    async fn test_expand_discards_superseded_selection() {
        let memory = Arc::new(MemoryDocumentStore::new());
        let service = Arc::new(CategoryService::new(
            memory.clone(),
            OperationPolicy::default(),
            CategoryDeletePolicy::Restrict,
        ));
        let session = Arc::new(admin_session());
        let c1 = service.create_category(&session, "Electronics").await.unwrap();
        let c2 = service.create_category(&session, "Books").await.unwrap();

        memory.set_latency(Duration::from_millis(100));
        let slow = {
            let service = service.clone();
            let session = session.clone();
            let id = c1.id.clone();
            tokio::spawn(async move {
                service
                    .expand_category(&session, &id, &CancelToken::new())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let latest = service
            .expand_category(&session, &c2.id, &CancelToken::new())
            .await
            .unwrap();

        assert_eq!(latest.category_id, c2.id);
        assert!(matches!(slow.await.unwrap(), Err(AppError::Cancelled(_))));
        assert_eq!(session.focused_category(), Some(c2.id));
    }

    #[tokio::test]
    async fn test_referential_check() {
        let (_, service) = service_with(CategoryDeletePolicy::Restrict);
        let session = admin_session();
        let c1 = service.create_category(&session, "Electronics").await.unwrap();
        let c2 = service.create_category(&session, "Books").await.unwrap();
        let s1 = service
            .create_subcategory(&session, &c1.id, "Phones")
            .await
            .unwrap();

        assert!(service.ensure_subcategory_belongs(&c1.id, &s1.id).await.is_ok());
        assert!(matches!(
            service.ensure_subcategory_belongs(&c2.id, &s1.id).await,
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            service.ensure_subcategory_belongs("ghost", &s1.id).await,
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_delete_policy_parsing() {
        assert_eq!(
            "Cascade".parse::<CategoryDeletePolicy>().unwrap(),
            CategoryDeletePolicy::Cascade
        );
        assert_eq!(
            "restrict".parse::<CategoryDeletePolicy>().unwrap(),
            CategoryDeletePolicy::Restrict
        );
        assert!("orphan".parse::<CategoryDeletePolicy>().is_err());
    }
}
