use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

use super::format_date;

/// Moderation state of a listing. Stored as its integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ItemStatus {
    #[default]
    Pending,
    Confirmed,
    Blocked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationAction {
    Confirm,
    Block,
}

impl ModerationAction {
    pub fn verb(self) -> &'static str {
        match self {
            ModerationAction::Confirm => "confirm",
            ModerationAction::Block => "block",
        }
    }
}

impl ItemStatus {
    /// Every (state, action) pair and the state it leads to.
    /// No action leads back to `Pending`.
    pub const TRANSITIONS: [(ItemStatus, ModerationAction, ItemStatus); 6] = [
        (ItemStatus::Pending, ModerationAction::Confirm, ItemStatus::Confirmed),
        (ItemStatus::Pending, ModerationAction::Block, ItemStatus::Blocked),
        (ItemStatus::Confirmed, ModerationAction::Confirm, ItemStatus::Confirmed),
        (ItemStatus::Confirmed, ModerationAction::Block, ItemStatus::Blocked),
        (ItemStatus::Blocked, ModerationAction::Confirm, ItemStatus::Confirmed),
        (ItemStatus::Blocked, ModerationAction::Block, ItemStatus::Blocked),
    ];

    pub fn apply(self, action: ModerationAction) -> ItemStatus {
        Self::TRANSITIONS
            .iter()
            .find(|(from, on, _)| *from == self && *on == action)
            .map(|(_, _, to)| *to)
            .unwrap_or(self)
    }

    pub fn code(self) -> i64 {
        match self {
            ItemStatus::Pending => 0,
            ItemStatus::Confirmed => 1,
            ItemStatus::Blocked => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ItemStatus::Pending => "Pending",
            ItemStatus::Confirmed => "Confirmed",
            ItemStatus::Blocked => "Blocked",
        }
    }
}

/// Label for a raw stored code, including codes outside the enum.
pub fn status_label(code: i64) -> &'static str {
    ItemStatus::try_from(code)
        .map(ItemStatus::label)
        .unwrap_or("Unknown")
}

impl TryFrom<i64> for ItemStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ItemStatus::Pending),
            1 => Ok(ItemStatus::Confirmed),
            2 => Ok(ItemStatus::Blocked),
            other => Err(format!("unknown item status code {}", other)),
        }
    }
}

impl From<ItemStatus> for i64 {
    fn from(status: ItemStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemListing {
    #[serde(default)]
    pub id: String,
    pub item_name: String,
    pub item_price: f64,
    #[serde(default)]
    pub item_brand: String,
    pub item_category: String,
    pub item_sub_category: String,
    #[serde(default)]
    pub item_country: String,
    #[serde(default)]
    pub item_city: String,
    #[serde(default)]
    pub item_town: String,
    #[serde(default)]
    pub item_district: String,
    #[serde(default)]
    pub item_street: String,
    pub item_date: DateTime<Utc>,
    #[serde(default)]
    pub item_desc: String,
    #[serde(default)]
    pub item_status: ItemStatus,
}

impl ItemListing {
    pub fn price_label(&self) -> String {
        price_label(self.item_price)
    }

    pub fn date_label(&self) -> String {
        format_date(&self.item_date)
    }
}

pub fn price_label(price: f64) -> String {
    format!("{} €", price)
}

/// Full edit payload. Every editable field is always written together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub item_name: String,
    pub item_price: f64,
    pub item_brand: String,
    pub item_category: String,
    pub item_sub_category: String,
    pub item_country: String,
    pub item_city: String,
    pub item_town: String,
    pub item_district: String,
    pub item_street: String,
    pub item_date: DateTime<Utc>,
    pub item_desc: String,
}

impl ItemUpdate {
    pub fn from_listing(item: &ItemListing) -> Self {
        Self {
            item_name: item.item_name.clone(),
            item_price: item.item_price,
            item_brand: item.item_brand.clone(),
            item_category: item.item_category.clone(),
            item_sub_category: item.item_sub_category.clone(),
            item_country: item.item_country.clone(),
            item_city: item.item_city.clone(),
            item_town: item.item_town.clone(),
            item_district: item.item_district.clone(),
            item_street: item.item_street.clone(),
            item_date: item.item_date,
            item_desc: item.item_desc.clone(),
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        let required = [
            ("name", &self.item_name),
            ("brand", &self.item_brand),
            ("category", &self.item_category),
            ("sub-category", &self.item_sub_category),
            ("country", &self.item_country),
            ("city", &self.item_city),
            ("town", &self.item_town),
            ("district", &self.item_district),
            ("street", &self.item_street),
            ("description", &self.item_desc),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(AppError::InvalidInput(format!("{} is required", field)));
        }
        if !self.item_price.is_finite() || self.item_price < 0.0 {
            return Err(AppError::InvalidInput(format!(
                "price must be a non-negative number, got {}",
                self.item_price
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn sample_listing() -> ItemListing {
        ItemListing {
            id: "i1".into(),
            item_name: "Phone".into(),
            item_price: 250.5,
            item_brand: "Acme".into(),
            item_category: "c1".into(),
            item_sub_category: "s1".into(),
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

    #[test]
    fn test_transition_table_is_total() {
        for from in [ItemStatus::Pending, ItemStatus::Confirmed, ItemStatus::Blocked] {
            for action in [ModerationAction::Confirm, ModerationAction::Block] {
                let hits = ItemStatus::TRANSITIONS
                    .iter()
                    .filter(|(f, a, _)| *f == from && *a == action)
                    .count();
                assert_eq!(hits, 1, "{:?} x {:?}", from, action);
            }
        }
        assert!(ItemStatus::TRANSITIONS
            .iter()
            .all(|(_, _, to)| *to != ItemStatus::Pending));
    }

    #[test]
    fn test_transitions_overwrite() {
        assert_eq!(
            ItemStatus::Pending.apply(ModerationAction::Confirm),
            ItemStatus::Confirmed
        );
        assert_eq!(
            ItemStatus::Confirmed
                .apply(ModerationAction::Confirm)
                .apply(ModerationAction::Confirm),
            ItemStatus::Confirmed
        );
        assert_eq!(
            ItemStatus::Pending
                .apply(ModerationAction::Block)
                .apply(ModerationAction::Confirm),
            ItemStatus::Confirmed
        );
        assert_eq!(
            ItemStatus::Confirmed.apply(ModerationAction::Block),
            ItemStatus::Blocked
        );
    }

    #[test]
    fn test_status_codes_and_labels() {
        assert_eq!(status_label(0), "Pending");
        assert_eq!(status_label(1), "Confirmed");
        assert_eq!(status_label(2), "Blocked");
        assert_eq!(status_label(7), "Unknown");
        assert_eq!(serde_json::to_value(ItemStatus::Blocked).unwrap(), json!(2));
        assert!(serde_json::from_value::<ItemStatus>(json!(5)).is_err());
    }

    #[test]
    fn test_listing_labels_and_wire_names() {
        let item = sample_listing();
        assert_eq!(item.price_label(), "250.5 €");
        assert_eq!(item.date_label(), "05-03-2024 14:07:09");

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["itemSubCategory"], "s1");
        assert_eq!(value["itemStatus"], 0);
        assert_eq!(value["itemDesc"], "Barely used");
    }

    #[test]
    fn test_update_validation() {
        let update = ItemUpdate::from_listing(&sample_listing());
        assert!(update.validate().is_ok());

        let mut blank = update.clone();
        blank.item_street = "  ".into();
        assert!(matches!(blank.validate(), Err(AppError::InvalidInput(m)) if m.contains("street")));

        let mut negative = update.clone();
        negative.item_price = -1.0;
        assert!(negative.validate().is_err());

        let mut nan = update;
        nan.item_price = f64::NAN;
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_update_payload_has_no_status() {
        let value = serde_json::to_value(ItemUpdate::from_listing(&sample_listing())).unwrap();
        assert!(value.get("itemStatus").is_none());
        assert_eq!(value.as_object().unwrap().len(), 12);
    }
}
