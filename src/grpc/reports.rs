use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::models::{format_date, Report, ReportStatus};
use crate::proto::common::{ConfirmationPrompt as ProtoPrompt, Empty, OutcomeRes};
use crate::proto::reports::reports_service_server::ReportsService;
use crate::proto::reports::{
    AdvanceStatusRes, DeleteReportReq, ListReportsRes, Report as ProtoReport, ReportIdReq,
    ReportStatus as ProtoReportStatus,
};
use crate::services::ReportService;
use crate::session::SessionRegistry;

use super::{decision, outcome_to_proto, prompt_to_proto, session_for};

pub struct ReportsServiceImpl {
    reports: Arc<ReportService>,
    sessions: Arc<SessionRegistry>,
}

impl ReportsServiceImpl {
    pub fn new(reports: Arc<ReportService>, sessions: Arc<SessionRegistry>) -> Self {
        Self { reports, sessions }
    }

    fn status_to_proto(status: ReportStatus) -> ProtoReportStatus {
        match status {
            ReportStatus::Created => ProtoReportStatus::Created,
            ReportStatus::Pending => ProtoReportStatus::Pending,
            ReportStatus::Completed => ProtoReportStatus::Completed,
        }
    }

    fn report_to_proto(report: Report) -> ProtoReport {
        ProtoReport {
            subject_label: report.subject_label().to_string(),
            date_label: format_date(&report.date),
            status: Self::status_to_proto(report.status).into(),
            status_label: report.status.label().to_string(),
            id: report.id,
            title: report.title,
            subject: report.subject,
            message: report.message,
        }
    }
}

#[tonic::async_trait]
impl ReportsService for ReportsServiceImpl {
    async fn list_reports(
        &self,
        request: Request<Empty>,
    ) -> Result<Response<ListReportsRes>, Status> {
        session_for(&self.sessions, &request)?;
        let reports = self.reports.list_reports().await?;
        Ok(Response::new(ListReportsRes {
            reports: reports.into_iter().map(Self::report_to_proto).collect(),
        }))
    }

    async fn get_report(
        &self,
        request: Request<ReportIdReq>,
    ) -> Result<Response<ProtoReport>, Status> {
        session_for(&self.sessions, &request)?;
        let report = self.reports.get_report(&request.into_inner().id).await?;
        Ok(Response::new(Self::report_to_proto(report)))
    }

    async fn advance_status(
        &self,
        request: Request<ReportIdReq>,
    ) -> Result<Response<AdvanceStatusRes>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let status = self
            .reports
            .advance_status(&session, &request.into_inner().id)
            .await?;
        Ok(Response::new(AdvanceStatusRes {
            status: Self::status_to_proto(status).into(),
            status_label: status.label().to_string(),
        }))
    }

    async fn prepare_delete(
        &self,
        request: Request<ReportIdReq>,
    ) -> Result<Response<ProtoPrompt>, Status> {
        session_for(&self.sessions, &request)?;
        let prepared = self.reports.prepare_delete(&request.into_inner().id).await?;
        Ok(Response::new(prompt_to_proto(prepared.prompt)))
    }

    async fn delete_report(
        &self,
        request: Request<DeleteReportReq>,
    ) -> Result<Response<OutcomeRes>, Status> {
        let session = session_for(&self.sessions, &request)?;
        let req = request.into_inner();

        let prepared = self.reports.prepare_delete(&req.id).await?;
        let outcome = self
            .reports
            .delete_report(&session, &prepared, decision(req.accepted))
            .await?;
        Ok(Response::new(outcome_to_proto(outcome)))
    }
}
