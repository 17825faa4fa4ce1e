//! Item edit form with cascading category/subcategory selection.
//!
//! Selecting a category is a two-phase step: [`ItemEditForm::select_category`]
//! empties and disables the subcategory field and hands back a
//! [`SubcategoryFetch`]. Only when that fetch is resolved and passed to
//! [`ItemEditForm::complete`] does the field accept input again. Fetches
//! belonging to an earlier selection are ignored.

use chrono::{DateTime, Utc};

use crate::error::{AppError, AppResult};
use crate::models::{ItemListing, ItemUpdate, Subcategory};
use crate::services::category_service::CategoryService;
use crate::session::CancelToken;

/// Free-text fields of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Name,
    Brand,
    Country,
    City,
    Town,
    District,
    Street,
    Description,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubcategoryFetch {
    generation: u64,
    category_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSubcategories {
    generation: u64,
    category_id: String,
    subcategories: Vec<Subcategory>,
}

impl SubcategoryFetch {
    pub fn category_id(&self) -> &str {
        &self.category_id
    }

    pub async fn resolve(
        self,
        categories: &CategoryService,
        cancel: &CancelToken,
    ) -> AppResult<ResolvedSubcategories> {
        let subcategories = categories
            .fetch_subcategories(&self.category_id, cancel)
            .await?;
        Ok(ResolvedSubcategories {
            generation: self.generation,
            category_id: self.category_id,
            subcategories,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ItemEditForm {
    item_id: String,
    draft: ItemUpdate,
    subcategory_choices: Vec<Subcategory>,
    subcategory_enabled: bool,
    generation: u64,
}

impl ItemEditForm {
    /// Pre-populates every field from `item` and loads the subcategories of
    /// its category.
    pub async fn load(item: &ItemListing, categories: &CategoryService) -> AppResult<Self> {
        let choices = categories.list_subcategories(&item.item_category).await?;
        let mut draft = ItemUpdate::from_listing(item);
        if !choices.iter().any(|s| s.id == draft.item_sub_category) {
            tracing::warn!(
                "Item {} references subcategory {} outside category {}",
                item.id,
                draft.item_sub_category,
                draft.item_category
            );
            draft.item_sub_category.clear();
        }
        Ok(Self {
            item_id: item.id.clone(),
            draft,
            subcategory_choices: choices,
            subcategory_enabled: true,
            generation: 0,
        })
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn draft(&self) -> &ItemUpdate {
        &self.draft
    }

    pub fn subcategory_choices(&self) -> &[Subcategory] {
        &self.subcategory_choices
    }

    pub fn is_subcategory_enabled(&self) -> bool {
        self.subcategory_enabled
    }

    pub fn select_category(&mut self, category_id: &str) -> SubcategoryFetch {
        self.generation += 1;
        self.draft.item_category = category_id.to_string();
        self.draft.item_sub_category.clear();
        self.subcategory_choices.clear();
        self.subcategory_enabled = false;
        SubcategoryFetch {
            generation: self.generation,
            category_id: category_id.to_string(),
        }
    }

    /// Applies a resolved fetch. Returns false, leaving the form untouched,
    /// when a newer category has been selected since.
    pub fn complete(&mut self, resolved: ResolvedSubcategories) -> bool {
        if resolved.generation != self.generation
            || resolved.category_id != self.draft.item_category
        {
            tracing::debug!(
                "Ignoring stale subcategories for category {}",
                resolved.category_id
            );
            return false;
        }
        self.subcategory_choices = resolved.subcategories;
        self.subcategory_enabled = true;
        true
    }

    pub fn set_subcategory(&mut self, subcategory_id: &str) -> AppResult<()> {
        if !self.subcategory_enabled {
            return Err(AppError::InvalidInput(
                "sub-categories are still loading".to_string(),
            ));
        }
        if !self.subcategory_choices.iter().any(|s| s.id == subcategory_id) {
            return Err(AppError::InvalidInput(format!(
                "sub-category {} is not part of the selected category",
                subcategory_id
            )));
        }
        self.draft.item_sub_category = subcategory_id.to_string();
        Ok(())
    }

    pub fn set_field(&mut self, field: ItemField, value: impl Into<String>) {
        let value = value.into();
        let slot = match field {
            ItemField::Name => &mut self.draft.item_name,
            ItemField::Brand => &mut self.draft.item_brand,
            ItemField::Country => &mut self.draft.item_country,
            ItemField::City => &mut self.draft.item_city,
            ItemField::Town => &mut self.draft.item_town,
            ItemField::District => &mut self.draft.item_district,
            ItemField::Street => &mut self.draft.item_street,
            ItemField::Description => &mut self.draft.item_desc,
        };
        *slot = value;
    }

    pub fn set_price(&mut self, price: f64) {
        self.draft.item_price = price;
    }

    pub fn set_date(&mut self, date: DateTime<Utc>) {
        self.draft.item_date = date;
    }

    /// The full payload to write. Fails while the subcategory field is
    /// disabled or empty.
    pub fn submit(&self) -> AppResult<ItemUpdate> {
        if !self.subcategory_enabled {
            return Err(AppError::InvalidInput(
                "sub-categories are still loading".to_string(),
            ));
        }
        if self.draft.item_sub_category.is_empty() {
            return Err(AppError::InvalidInput("select a sub-category".to_string()));
        }
        self.draft.validate()?;
        Ok(self.draft.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;

    use super::*;
    use crate::models::ItemStatus;
    use crate::services::category_service::CategoryDeletePolicy;
    use crate::session::{AdminSession, AuthenticatedUser, OperationPolicy, Role};
    use crate::store::MemoryDocumentStore;

    struct Taxonomy {
        service: CategoryService,
        electronics: String,
        phones: String,
        books: String,
        novels: String,
    }

    async fn taxonomy() -> Taxonomy {
        let service = CategoryService::new(
            Arc::new(MemoryDocumentStore::new()),
            OperationPolicy::default(),
            CategoryDeletePolicy::Restrict,
        );
        let session = AdminSession::establish(Some(AuthenticatedUser {
            user_id: "admin-1".into(),
            role: Role::Admin,
        }))
        .unwrap();
        let electronics = service.create_category(&session, "Electronics").await.unwrap();
        let phones = service
            .create_subcategory(&session, &electronics.id, "Phones")
            .await
            .unwrap();
        let books = service.create_category(&session, "Books").await.unwrap();
        let novels = service
            .create_subcategory(&session, &books.id, "Novels")
            .await
            .unwrap();
        Taxonomy {
            service,
            electronics: electronics.id,
            phones: phones.id,
            books: books.id,
            novels: novels.id,
        }
    }

    fn item(category: &str, subcategory: &str) -> ItemListing {
        ItemListing {
            id: "i1".into(),
            item_name: "Phone X".into(),
            item_price: 120.0,
            item_brand: "Acme".into(),
            item_category: category.into(),
            item_sub_category: subcategory.into(),
            item_country: "Germany".into(),
            item_city: "Berlin".into(),
            item_town: "Mitte".into(),
            item_district: "Central".into(),
            item_street: "Main 1".into(),
            item_date: Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap(),
            item_desc: "Barely used".into(),
            item_status: ItemStatus::Pending,
        }
    }

    #[tokio::test]
    async fn test_load_prepopulates() {
        let t = taxonomy().await;
        let form = ItemEditForm::load(&item(&t.electronics, &t.phones), &t.service)
            .await
            .unwrap();
        assert_eq!(form.item_id(), "i1");
        assert_eq!(form.draft().item_sub_category, t.phones);
        assert!(form.is_subcategory_enabled());
        assert_eq!(form.subcategory_choices().len(), 1);
        assert!(form.submit().is_ok());
    }

    #[tokio::test]
    async fn test_select_category_empties_subcategory_before_fetch() {
        let t = taxonomy().await;
        let mut form = ItemEditForm::load(&item(&t.electronics, &t.phones), &t.service)
            .await
            .unwrap();

        let fetch = form.select_category(&t.books);
        assert_eq!(form.draft().item_sub_category, "");
        assert!(form.subcategory_choices().is_empty());
        assert!(!form.is_subcategory_enabled());
        assert!(form.submit().is_err());
        assert!(form.set_subcategory(&t.phones).is_err());

        let resolved = fetch.resolve(&t.service, &CancelToken::new()).await.unwrap();
        assert!(form.complete(resolved));
        assert!(form.set_subcategory(&t.phones).is_err());
        form.set_subcategory(&t.novels).unwrap();

        let update = form.submit().unwrap();
        assert_eq!(update.item_category, t.books);
        assert_eq!(update.item_sub_category, t.novels);
    }

    #[tokio::test]
    async fn test_stale_fetch_is_ignored() {
        let t = taxonomy().await;
        let mut form = ItemEditForm::load(&item(&t.electronics, &t.phones), &t.service)
            .await
            .unwrap();

        let first = form.select_category(&t.books);
        let second = form.select_category(&t.electronics);
        let late = first.resolve(&t.service, &CancelToken::new()).await.unwrap();
        assert!(!form.complete(late));
        assert!(!form.is_subcategory_enabled());

        let current = second.resolve(&t.service, &CancelToken::new()).await.unwrap();
        assert!(form.complete(current));
        assert_eq!(form.subcategory_choices()[0].id, t.phones);
    }

    #[tokio::test]
    async fn test_submit_requires_subcategory_and_valid_fields() {
        let t = taxonomy().await;
        let mut form = ItemEditForm::load(&item(&t.electronics, "elsewhere"), &t.service)
            .await
            .unwrap();
        assert_eq!(form.draft().item_sub_category, "");
        assert!(form.submit().is_err());

        form.set_subcategory(&t.phones).unwrap();
        form.set_field(ItemField::Street, "  ");
        assert!(form.submit().is_err());

        form.set_field(ItemField::Street, "Side 2");
        form.set_price(80.0);
        let update = form.submit().unwrap();
        assert_eq!(update.item_street, "Side 2");
        assert_eq!(update.item_price, 80.0);
    }
}
