use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{ItemListing, ItemStatus, ItemUpdate, ModerationAction};
use crate::services::category_service::CategoryService;
use crate::services::edit_form::ItemEditForm;
use crate::services::gallery::{ImageGalleryResolver, ItemPreview};
use crate::services::{ConfirmationPrompt, Decision, Outcome};
use crate::session::{AdminSession, CancelToken, EditSlot, OperationPolicy};
use crate::store::{DocumentStore, ItemStore};

/// A moderation action waiting for the operator's yes/no.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionRequest {
    pub item_id: String,
    pub action: ModerationAction,
    pub from: ItemStatus,
    pub to: ItemStatus,
    pub prompt: ConfirmationPrompt,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteRequest {
    pub item_id: String,
    pub prompt: ConfirmationPrompt,
}

/// One line of the moderation table.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemRow {
    pub id: String,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub status: ItemStatus,
    pub status_label: String,
    pub price_label: String,
    pub date_label: String,
}

pub struct ItemService {
    store: ItemStore,
    categories: Arc<CategoryService>,
    gallery: ImageGalleryResolver,
    policy: OperationPolicy,
    cached: RwLock<Vec<ItemListing>>,
}

impl ItemService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        categories: Arc<CategoryService>,
        gallery: ImageGalleryResolver,
        policy: OperationPolicy,
    ) -> Self {
        Self {
            store: ItemStore::new(store),
            categories,
            gallery,
            policy,
            cached: RwLock::new(Vec::new()),
        }
    }

    /// Fetches every listing. Records that fail to decode are skipped.
    pub async fn list_items(&self) -> AppResult<Vec<ItemListing>> {
        let docs = self
            .policy
            .run("list items", self.store.list_documents())
            .await
            .inspect_err(|e| tracing::error!("Error fetching items: {}", e))?;

        let items: Vec<ItemListing> = docs
            .iter()
            .filter_map(|doc| match doc.decode::<ItemListing>() {
                Ok(item) => Some(item),
                Err(e) => {
                    tracing::warn!("Skipping item {}: {}", doc.id, e);
                    None
                }
            })
            .collect();

        *self.cached.write().await = items.clone();
        Ok(items)
    }

    /// Listings as of the last successful fetch.
    pub async fn cached_items(&self) -> Vec<ItemListing> {
        self.cached.read().await.clone()
    }

    pub async fn list_items_with_status(&self, status: ItemStatus) -> AppResult<Vec<ItemListing>> {
        Ok(self
            .list_items()
            .await?
            .into_iter()
            .filter(|item| item.item_status == status)
            .collect())
    }

    pub async fn get_item(&self, id: &str) -> AppResult<ItemListing> {
        self.policy
            .run("get item", self.store.get_item(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))
    }

    /// Display rows with category and subcategory names resolved. Names
    /// that cannot be resolved show as "Unknown".
    pub async fn item_rows(&self) -> AppResult<Vec<ItemRow>> {
        let items = self.list_items().await?;

        if let Err(e) = self.categories.list_categories().await {
            tracing::warn!("Showing item rows with cached category names: {}", e);
        }
        let referenced: BTreeSet<&str> = items.iter().map(|i| i.item_category.as_str()).collect();
        self.categories.ensure_subcategories_loaded(referenced).await;

        let mut rows = Vec::with_capacity(items.len());
        for item in &items {
            rows.push(ItemRow {
                id: item.id.clone(),
                name: item.item_name.clone(),
                category: self.categories.category_name(&item.item_category).await,
                subcategory: self
                    .categories
                    .subcategory_name(&item.item_category, &item.item_sub_category)
                    .await,
                status: item.item_status,
                status_label: item.item_status.label().to_string(),
                price_label: item.price_label(),
                date_label: item.date_label(),
            });
        }
        Ok(rows)
    }

    /// First phase of a moderation action: builds the prompt the operator
    /// must accept before anything is written.
    pub async fn prepare_transition(
        &self,
        id: &str,
        action: ModerationAction,
    ) -> AppResult<TransitionRequest> {
        let item = self.get_item(id).await?;
        Ok(TransitionRequest {
            item_id: item.id.clone(),
            action,
            from: item.item_status,
            to: item.item_status.apply(action),
            prompt: ConfirmationPrompt::for_item(
                format!("Are you sure you want to {} this item?", action.verb()),
                &item,
            ),
        })
    }

    /// Second phase. Writes only `itemStatus`; on failure nothing local changes.
    pub async fn apply_transition(
        &self,
        session: &AdminSession,
        request: &TransitionRequest,
        decision: Decision,
    ) -> AppResult<Outcome> {
        if decision == Decision::Declined {
            tracing::info!(
                "Moderation of item {} declined by {}",
                request.item_id,
                session.user().user_id
            );
            return Ok(Outcome::Declined);
        }
        let _guard = session.begin(EditSlot::Item)?;

        self.policy
            .run(
                "update item status",
                self.store.set_status(&request.item_id, request.to),
            )
            .await
            .inspect_err(|e| {
                tracing::error!("Failed to {} item {}: {}", request.action.verb(), request.item_id, e)
            })?;
        tracing::info!(
            "Item {} status: {} -> {} by {}",
            request.item_id,
            request.from,
            request.to,
            session.user().user_id
        );

        session.close_preview();
        self.refresh().await;
        Ok(Outcome::Applied)
    }

    /// Rewrites every editable field in one document write.
    pub async fn update_item(
        &self,
        session: &AdminSession,
        id: &str,
        update: &ItemUpdate,
    ) -> AppResult<()> {
        update.validate()?;
        let _guard = session.begin(EditSlot::Item)?;

        self.categories
            .ensure_subcategory_belongs(&update.item_category, &update.item_sub_category)
            .await?;

        self.policy
            .run("update item", self.store.update_item(id, update))
            .await
            .inspect_err(|e| tracing::error!("Failed to update item {}: {}", id, e))?;
        tracing::info!("Item updated: id={}, by={}", id, session.user().user_id);

        self.refresh().await;
        Ok(())
    }

    /// Loads `id` into the operator's edit form, replacing any open one.
    pub async fn open_edit_form(&self, session: &AdminSession, id: &str) -> AppResult<ItemEditForm> {
        session.close_edit_form();
        let item = self.get_item(id).await?;
        let form = ItemEditForm::load(&item, &self.categories).await?;
        session.open_edit_form(form.clone());
        Ok(form)
    }

    /// Switches the form to `category_id` and reloads its subcategories.
    /// A newer selection made while this one was loading wins.
    pub async fn select_edit_category(
        &self,
        session: &AdminSession,
        category_id: &str,
        cancel: &CancelToken,
    ) -> AppResult<ItemEditForm> {
        let fetch = session
            .with_edit_form(|form| form.select_category(category_id))
            .ok_or_else(no_edit_form)?;
        let resolved = fetch.resolve(&self.categories, cancel).await?;
        session
            .with_edit_form(|form| {
                form.complete(resolved);
                form.clone()
            })
            .ok_or_else(no_edit_form)
    }

    pub fn select_edit_subcategory(
        &self,
        session: &AdminSession,
        subcategory_id: &str,
    ) -> AppResult<ItemEditForm> {
        session
            .with_edit_form(|form| form.set_subcategory(subcategory_id).map(|_| form.clone()))
            .ok_or_else(no_edit_form)?
    }

    /// Writes the open form through [`update_item`](Self::update_item) and
    /// closes it. The form stays open when the write fails.
    pub async fn submit_edit_form(&self, session: &AdminSession) -> AppResult<()> {
        let (item_id, update) = session
            .with_edit_form(|form| form.submit().map(|update| (form.item_id().to_string(), update)))
            .ok_or_else(no_edit_form)??;
        self.update_item(session, &item_id, &update).await?;
        session.close_edit_form();
        Ok(())
    }

    pub async fn prepare_delete(&self, id: &str) -> AppResult<DeleteRequest> {
        let item = self.get_item(id).await?;
        Ok(DeleteRequest {
            item_id: item.id.clone(),
            prompt: ConfirmationPrompt::for_item(
                "Are you sure you want to delete this item?".to_string(),
                &item,
            ),
        })
    }

    pub async fn delete_item(
        &self,
        session: &AdminSession,
        request: &DeleteRequest,
        decision: Decision,
    ) -> AppResult<Outcome> {
        if decision == Decision::Declined {
            return Ok(Outcome::Declined);
        }
        let _guard = session.begin(EditSlot::Item)?;

        self.policy
            .run("delete item", self.store.delete_item(&request.item_id))
            .await
            .inspect_err(|e| tracing::error!("Failed to delete item {}: {}", request.item_id, e))?;
        tracing::info!(
            "Item deleted: id={}, by={}",
            request.item_id,
            session.user().user_id
        );

        if session.preview_item_id().as_deref() == Some(request.item_id.as_str()) {
            session.close_preview();
        }
        self.refresh().await;
        Ok(Outcome::Applied)
    }

    /// Opens `id` in the session's preview with the gallery at index 0. A
    /// gallery that cannot be resolved is shown empty.
    pub async fn open_preview(
        &self,
        session: &AdminSession,
        id: &str,
        cancel: &CancelToken,
    ) -> AppResult<ItemPreview> {
        // the previous item's photos must never show under the new item
        session.close_preview();

        let item = self
            .policy
            .run_cancellable("get item", cancel, self.store.get_item(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Item not found".to_string()))?;

        let urls = match self.gallery.resolve_images(id, cancel).await {
            Ok(urls) => urls,
            Err(e @ AppError::Cancelled(_)) => return Err(e),
            Err(e) => {
                tracing::warn!("Showing item {} without photos: {}", id, e);
                Vec::new()
            }
        };

        let preview = ItemPreview::new(item, urls);
        session.show_preview(preview.clone());
        Ok(preview)
    }

    async fn refresh(&self) {
        // failure is logged by list_items; the cached list stays last-known-good
        let _ = self.list_items().await;
    }
}

fn no_edit_form() -> AppError {
    AppError::Conflict("No item edit form is open".to_string())
}
