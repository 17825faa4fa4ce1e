use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    #[serde(default)]
    pub id: String,
    pub category_name: String,
}

/// Lives only inside the `subCategories` collection of its parent category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subcategory {
    #[serde(default)]
    pub id: String,
    pub sub_category_name: String,
}

/// Trims a category or subcategory name and rejects blank input.
pub fn normalize_name(kind: &str, name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidInput(format!("{} name is required", kind)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("category", "  Phones ").unwrap(), "Phones");
        assert!(matches!(
            normalize_name("subcategory", "   "),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_stored_field_names() {
        let value = serde_json::to_value(Subcategory {
            id: "s1".into(),
            sub_category_name: "Phones".into(),
        })
        .unwrap();
        assert_eq!(value["subCategoryName"], "Phones");
    }
}
