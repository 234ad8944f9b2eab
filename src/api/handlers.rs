use crate::api::ApiState;
use crate::api::responses::{
    ApiErrorCode, ApiErrorResponse, ReportProgress, ReportRunningResponse, TriggerSuccessResponse,
};
use crate::report::ReportRunner;
use crate::state::{AppState, ReportStatus};
use axum::Json;
use axum::extract::{Query, State};
use axum::http::{HeaderName, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const REPORT_STATUS_HEADER: HeaderName = HeaderName::from_static("x-report-status");

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub report_id: String,
}

pub enum TriggerResponse {
    Success(TriggerSuccessResponse),
    Error {
        status: StatusCode,
        body: ApiErrorResponse,
    },
}

impl IntoResponse for TriggerResponse {
    fn into_response(self) -> Response {
        match self {
            TriggerResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            TriggerResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn trigger_report(State(api): State<ApiState>) -> impl IntoResponse {
    build_trigger_response(&api.runner, &api.reports)
}

pub enum ReportResponse {
    Running(ReportRunningResponse),
    Complete { report_id: String, csv: Vec<u8> },
    Error {
        status: StatusCode,
        body: ApiErrorResponse,
    },
}

impl IntoResponse for ReportResponse {
    fn into_response(self) -> Response {
        match self {
            ReportResponse::Running(body) => (StatusCode::OK, Json(body)).into_response(),
            ReportResponse::Complete { report_id, csv } => (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"report_{report_id}.csv\""),
                    ),
                    (REPORT_STATUS_HEADER, "Complete".to_string()),
                ],
                csv,
            )
                .into_response(),
            ReportResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_report(
    State(api): State<ApiState>,
    Query(query): Query<ReportQuery>,
) -> impl IntoResponse {
    match lookup_report(&api.reports, &query.report_id, Utc::now()) {
        ReportLookup::Ready(response) => response,
        ReportLookup::Artifact { report_id, path } => read_artifact(report_id, &path).await,
    }
}

/// Registry lookup result. A complete report still needs its artifact read,
/// which happens outside the registry lock.
enum ReportLookup {
    Ready(ReportResponse),
    Artifact { report_id: String, path: PathBuf },
}

fn build_trigger_response(
    runner: &Arc<ReportRunner>,
    reports: &Arc<RwLock<AppState>>,
) -> TriggerResponse {
    match runner.trigger(reports) {
        Ok(report_id) => TriggerResponse::Success(TriggerSuccessResponse { report_id }),
        Err(err) => {
            error!(error = %err, "Internal error while handling /trigger_report");
            TriggerResponse::Error {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: error_body(ApiErrorCode::InternalError, INTERNAL_ERROR_MESSAGE, Utc::now()),
            }
        }
    }
}

fn lookup_report(reports: &RwLock<AppState>, report_id: &str, now: DateTime<Utc>) -> ReportLookup {
    let guard = match reports.read() {
        Ok(guard) => guard,
        Err(_) => {
            return ReportLookup::Ready(report_internal_error(
                "state lock poisoned while reading reports",
            ));
        }
    };
    let status = guard.report(report_id).map(|record| record.status.clone());
    drop(guard);

    match status {
        None => ReportLookup::Ready(ReportResponse::Error {
            status: StatusCode::NOT_FOUND,
            body: error_body(ApiErrorCode::ReportNotFound, "Report not found", now),
        }),
        Some(ReportStatus::Running) => ReportLookup::Ready(ReportResponse::Running(
            ReportRunningResponse {
                status: ReportProgress::Running,
                report_id: report_id.to_string(),
                timestamp: format_timestamp(now),
            },
        )),
        Some(ReportStatus::Failed { reason }) => ReportLookup::Ready(ReportResponse::Error {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: error_body(
                ApiErrorCode::ReportFailed,
                &format!("Report generation failed: {reason}"),
                now,
            ),
        }),
        Some(ReportStatus::Complete { artifact }) => ReportLookup::Artifact {
            report_id: report_id.to_string(),
            path: artifact,
        },
    }
}

async fn read_artifact(report_id: String, path: &Path) -> ReportResponse {
    match tokio::fs::read(path).await {
        Ok(csv) => ReportResponse::Complete { report_id, csv },
        Err(err) => {
            error!(report_id = %report_id, path = %path.display(), error = %err, "Report artifact unreadable");
            report_internal_error("report artifact unreadable")
        }
    }
}

fn report_internal_error(message: &str) -> ReportResponse {
    error!(message = message, "Internal error while handling /get_report");
    ReportResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: error_body(ApiErrorCode::InternalError, INTERNAL_ERROR_MESSAGE, Utc::now()),
    }
}

fn error_body(error_code: ApiErrorCode, message: &str, now: DateTime<Utc>) -> ApiErrorResponse {
    ApiErrorResponse {
        error_code,
        error_message: message.to_string(),
        timestamp: format_timestamp(now),
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
}
