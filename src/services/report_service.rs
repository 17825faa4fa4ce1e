use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{format_date, Report, ReportStatus};
use crate::services::{ConfirmationPrompt, Decision, Outcome};
use crate::session::{AdminSession, EditSlot, OperationPolicy};
use crate::store::{DocumentStore, ReportStore};

#[derive(Debug, Clone, PartialEq)]
pub struct ReportDeleteRequest {
    pub report_id: String,
    pub prompt: ConfirmationPrompt,
}

/// Reports and requests submitted by users.
pub struct ReportService {
    store: ReportStore,
    policy: OperationPolicy,
}

impl ReportService {
    pub fn new(store: Arc<dyn DocumentStore>, policy: OperationPolicy) -> Self {
        Self {
            store: ReportStore::new(store),
            policy,
        }
    }

    pub async fn list_reports(&self) -> AppResult<Vec<Report>> {
        self.policy
            .run("list reports", self.store.list_reports())
            .await
            .inspect_err(|e| tracing::error!("Error fetching reports: {}", e))
    }

    pub async fn get_report(&self, id: &str) -> AppResult<Report> {
        self.policy
            .run("get report", self.store.get_report(id))
            .await?
            .ok_or_else(|| AppError::NotFound("Report not found".to_string()))
    }

    /// Moves the report one step along Created -> Pending -> Completed -> Created.
    pub async fn advance_status(&self, session: &AdminSession, id: &str) -> AppResult<ReportStatus> {
        let _guard = session.begin(EditSlot::Report)?;
        let report = self.get_report(id).await?;
        let next = report.status.next();

        self.policy
            .run("update report status", self.store.set_status(id, next))
            .await
            .inspect_err(|e| tracing::error!("Failed to update report {}: {}", id, e))?;
        tracing::info!(
            "Report {} status: {} -> {}",
            id,
            report.status.label(),
            next.label()
        );
        Ok(next)
    }

    pub async fn prepare_delete(&self, id: &str) -> AppResult<ReportDeleteRequest> {
        let report = self.get_report(id).await?;
        Ok(ReportDeleteRequest {
            report_id: report.id.clone(),
            prompt: ConfirmationPrompt {
                title: "Are you sure you want to delete this report?".to_string(),
                details: vec![
                    format!("Title: {}", report.title),
                    format!("Subject: {}", report.subject_label()),
                    format!("Date: {}", format_date(&report.date)),
                ],
            },
        })
    }

    pub async fn delete_report(
        &self,
        session: &AdminSession,
        request: &ReportDeleteRequest,
        decision: Decision,
    ) -> AppResult<Outcome> {
        if decision == Decision::Declined {
            return Ok(Outcome::Declined);
        }
        let _guard = session.begin(EditSlot::Report)?;
        self.policy
            .run("delete report", self.store.delete_report(&request.report_id))
            .await
            .inspect_err(|e| {
                tracing::error!("Failed to delete report {}: {}", request.report_id, e)
            })?;
        tracing::info!("Report deleted: id={}", request.report_id);
        Ok(Outcome::Applied)
    }
}
