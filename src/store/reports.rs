use std::sync::Arc;

use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::models::{Report, ReportStatus};

use super::{decode_valid, CollectionPath, DocumentStore, Fields, REPORTS};

/// User-submitted reports and requests in `reportsRequests`.
#[derive(Clone)]
pub struct ReportStore {
    store: Arc<dyn DocumentStore>,
}

impl ReportStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn reports() -> AppResult<CollectionPath> {
        CollectionPath::root(REPORTS)
    }

    /// Decodable reports; malformed documents are logged and skipped.
    pub async fn list_reports(&self) -> AppResult<Vec<Report>> {
        let docs = self.store.list(&Self::reports()?).await?;
        Ok(decode_valid("report", &docs))
    }

    pub async fn get_report(&self, id: &str) -> AppResult<Option<Report>> {
        match self.store.get(&Self::reports()?, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn set_status(&self, id: &str, status: ReportStatus) -> AppResult<()> {
        let mut fields = Fields::new();
        fields.insert("status".to_string(), Value::from(status.code()));
        self.store
            .update(&Self::reports()?, id, fields)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Report not found".to_string()),
                other => other,
            })
    }

    pub async fn delete_report(&self, id: &str) -> AppResult<()> {
        self.store.delete(&Self::reports()?, id).await
    }
}
