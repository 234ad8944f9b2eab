use crate::source::SourceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("upstream fetch failed: {0}")]
    Source(#[from] SourceError),
    #[error("estimation worker failed: {0}")]
    Worker(String),
    #[error("failed to write report artifact: {0}")]
    Artifact(#[from] std::io::Error),
    #[error("failed to encode report artifact: {0}")]
    Encode(#[from] csv::Error),
    #[error("report not found: {0}")]
    ReportNotFound(String),
    #[error("report already registered: {0}")]
    DuplicateReport(String),
    #[error("report already finished: {0}")]
    ReportFinished(String),
    #[error("state lock poisoned")]
    StateLock,
}
