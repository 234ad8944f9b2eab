use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TriggerSuccessResponse {
    pub report_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum ReportProgress {
    Running,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReportRunningResponse {
    pub status: ReportProgress,
    pub report_id: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ApiErrorResponse {
    pub error_code: ApiErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    ReportNotFound,
    ReportFailed,
    InternalError,
}
