pub mod category;
pub mod item;
pub mod report;
pub mod user;

pub use category::*;
pub use item::*;
pub use report::*;
pub use user::*;

use chrono::{DateTime, Utc};

/// Display format used for listing and report dates.
pub const DATE_FORMAT: &str = "%d-%m-%Y %H:%M:%S";

pub fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}
