use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a user report/request. Advancing cycles back to `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ReportStatus {
    #[default]
    Created,
    Pending,
    Completed,
}

impl ReportStatus {
    pub fn next(self) -> ReportStatus {
        match self {
            ReportStatus::Created => ReportStatus::Pending,
            ReportStatus::Pending => ReportStatus::Completed,
            ReportStatus::Completed => ReportStatus::Created,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            ReportStatus::Created => 0,
            ReportStatus::Pending => 1,
            ReportStatus::Completed => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportStatus::Created => "Created",
            ReportStatus::Pending => "Pending",
            ReportStatus::Completed => "Completed",
        }
    }
}

impl TryFrom<i64> for ReportStatus {
    type Error = String;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ReportStatus::Created),
            1 => Ok(ReportStatus::Pending),
            2 => Ok(ReportStatus::Completed),
            other => Err(format!("unknown report status code {}", other)),
        }
    }
}

impl From<ReportStatus> for i64 {
    fn from(status: ReportStatus) -> Self {
        status.code()
    }
}

pub fn subject_label(subject: i64) -> &'static str {
    match subject {
        0 => "Category Request",
        1 => "Reporting a User",
        2 => "Reporting a bug",
        3 => "Technical Support",
        4 => "General Feedback",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub subject: i64,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: ReportStatus,
}

impl Report {
    pub fn subject_label(&self) -> &'static str {
        subject_label(self.subject)
    }
}
