pub mod category_service;
pub mod edit_form;
pub mod gallery;
pub mod item_service;
pub mod report_service;
pub mod user_service;

pub use category_service::{CategoryDeletePolicy, CategoryService};
pub use edit_form::ItemEditForm;
pub use gallery::{GalleryNavigator, ImageGalleryResolver, ItemPreview};
pub use item_service::ItemService;
pub use report_service::ReportService;
pub use user_service::UserService;

use crate::models::ItemListing;

/// Operator's answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Declined,
}

/// Yes/no prompt shown before a consequential write.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmationPrompt {
    pub title: String,
    pub details: Vec<String>,
}

impl ConfirmationPrompt {
    /// Prompt that names the item and its price as a sanity check.
    pub fn for_item(title: String, item: &ItemListing) -> Self {
        Self {
            title,
            details: vec![
                format!("Name: {}", item.item_name),
                format!("Price: {}", item.price_label()),
            ],
        }
    }
}
