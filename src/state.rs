use crate::error::AppError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::watch;

pub type ReportId = String;

/// Lifecycle of a report. `Complete` carries its artifact, so a finished
/// report can never be observed without one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportStatus {
    Running,
    Complete { artifact: PathBuf },
    Failed { reason: String },
}

impl ReportStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ReportStatus::Running => "Running",
            ReportStatus::Complete { .. } => "Complete",
            ReportStatus::Failed { .. } => "Failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(self, ReportStatus::Running)
    }
}

/// Terminal state a running report moves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Complete { artifact: PathBuf },
    Failed { reason: String },
}

impl From<ReportOutcome> for ReportStatus {
    fn from(outcome: ReportOutcome) -> Self {
        match outcome {
            ReportOutcome::Complete { artifact } => ReportStatus::Complete { artifact },
            ReportOutcome::Failed { reason } => ReportStatus::Failed { reason },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub report_id: ReportId,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Report registry shared between the HTTP handlers and report tasks.
#[derive(Debug)]
pub struct AppState {
    reports: HashMap<ReportId, ReportRecord>,
    updates_tx: watch::Sender<Option<ReportRecord>>,
}

impl AppState {
    pub fn new() -> Self {
        let (updates_tx, _updates_rx) = watch::channel(None);
        Self {
            reports: HashMap::new(),
            updates_tx,
        }
    }

    pub fn report(&self, report_id: &str) -> Option<&ReportRecord> {
        self.reports.get(report_id)
    }

    pub fn report_count(&self) -> usize {
        self.reports.len()
    }

    /// Receives every registered or finished report record.
    pub fn subscribe_reports(&self) -> watch::Receiver<Option<ReportRecord>> {
        self.updates_tx.subscribe()
    }

    pub fn create_report(
        &mut self,
        report_id: impl Into<ReportId>,
        created_at: DateTime<Utc>,
    ) -> Result<ReportRecord, AppError> {
        let report_id = report_id.into();
        if self.reports.contains_key(&report_id) {
            return Err(AppError::DuplicateReport(report_id));
        }
        let record = ReportRecord {
            report_id: report_id.clone(),
            status: ReportStatus::Running,
            created_at,
            finished_at: None,
        };
        self.reports.insert(report_id, record.clone());
        self.updates_tx.send_replace(Some(record.clone()));
        Ok(record)
    }

    /// Move a running report to its terminal state. A report finishes once;
    /// later attempts are rejected and leave the record untouched.
    pub fn finish_report(
        &mut self,
        report_id: &str,
        outcome: ReportOutcome,
        finished_at: DateTime<Utc>,
    ) -> Result<ReportRecord, AppError> {
        let record = self
            .reports
            .get_mut(report_id)
            .ok_or_else(|| AppError::ReportNotFound(report_id.to_string()))?;
        if record.status.is_finished() {
            return Err(AppError::ReportFinished(report_id.to_string()));
        }
        record.status = outcome.into();
        record.finished_at = Some(finished_at);
        let record = record.clone();
        self.updates_tx.send_replace(Some(record.clone()));
        Ok(record)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
