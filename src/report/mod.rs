//! Report lifecycle: register, compute in the background, publish the artifact.

use crate::error::AppError;
use crate::estimation::BatchCoordinator;
use crate::state::{AppState, ReportId, ReportOutcome, ReportRecord};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{error, info, warn};
use uuid::Uuid;

pub mod artifact;

pub const DEFAULT_OUTPUT_DIR: &str = "reports";

pub struct ReportRunner {
    coordinator: BatchCoordinator,
    output_dir: PathBuf,
}

impl ReportRunner {
    pub fn new(coordinator: BatchCoordinator, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            coordinator,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Register a new report as Running and compute it on a detached task.
    /// Returns as soon as the report is registered.
    pub fn trigger(self: &Arc<Self>, reports: &Arc<RwLock<AppState>>) -> Result<ReportId, AppError> {
        let report_id = Uuid::new_v4().to_string();
        reports
            .write()
            .map_err(|_| AppError::StateLock)?
            .create_report(report_id.clone(), Utc::now())?;
        info!(report_id = %report_id, "Report triggered");

        let runner = Arc::clone(self);
        let reports = Arc::clone(reports);
        let task_report_id = report_id.clone();
        tokio::spawn(async move {
            if let Err(err) = runner.complete(&reports, &task_report_id).await {
                error!(report_id = %task_report_id, error = %err, "Failed to record report outcome");
            }
        });
        Ok(report_id)
    }

    /// Compute every store's metrics and write the artifact. "Now" is the
    /// latest observation in the dataset, or the wall clock when there is none.
    pub async fn generate(&self, report_id: &str) -> Result<PathBuf, AppError> {
        let now = match self.coordinator.reference_instant().await? {
            Some(latest) => latest,
            None => {
                warn!(report_id = %report_id, "No observations available; using current time");
                Utc::now()
            }
        };

        let mut rows = self.coordinator.run(now).await?;
        rows.sort_by(|a, b| a.store_id.cmp(&b.store_id));
        artifact::write_artifact(&self.output_dir, report_id, &rows).await
    }

    /// Run `generate` and move the report to Complete or Failed.
    pub async fn complete(
        &self,
        reports: &RwLock<AppState>,
        report_id: &str,
    ) -> Result<ReportRecord, AppError> {
        let outcome = match self.generate(report_id).await {
            Ok(artifact) => {
                info!(report_id = %report_id, path = %artifact.display(), "Report complete");
                ReportOutcome::Complete { artifact }
            }
            Err(err) => {
                error!(report_id = %report_id, error = %err, "Report failed");
                ReportOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        };

        let mut guard = reports.write().map_err(|_| AppError::StateLock)?;
        guard.finish_report(report_id, outcome, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::{BatchSettings, Observation, StoreStatus};
    use crate::source::ObservationSource;
    use crate::source::memory::{MemoryObservationSource, MemoryReferenceData, UnavailableSource};
    use crate::state::ReportStatus;
    use chrono::{DateTime, TimeZone};
    use chrono_tz::Tz;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn instant(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 25, hour, minute, 0)
            .single()
            .expect("valid instant")
    }

    fn runner(source: Arc<dyn ObservationSource>, name: &str) -> Result<ReportRunner, Box<dyn std::error::Error>> {
        let unique = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
        let reference = Arc::new(MemoryReferenceData::new(Tz::UTC));
        let coordinator = BatchCoordinator::new(source, reference.clone(), reference, BatchSettings::default());
        Ok(ReportRunner::new(
            coordinator,
            std::env::temp_dir().join(format!("store-uptime-{name}-{unique}")),
        ))
    }

    #[tokio::test]
    async fn complete_marks_report_with_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let source = Arc::new(MemoryObservationSource::new(vec![
            Observation::new("b", instant(0, 0), StoreStatus::Active),
            Observation::new("a", instant(0, 30), StoreStatus::Inactive),
            Observation::new("b", instant(1, 0), StoreStatus::Active),
        ]));
        let runner = runner(source, "complete")?;
        let reports = RwLock::new(AppState::new());
        reports
            .write()
            .map_err(|_| AppError::StateLock)?
            .create_report("r-1", Utc::now())?;

        let record = runner.complete(&reports, "r-1").await?;
        let ReportStatus::Complete { artifact } = &record.status else {
            panic!("expected complete report, got {:?}", record.status);
        };
        let contents = std::fs::read_to_string(artifact)?;
        let _ = std::fs::remove_dir_all(runner.output_dir());

        let stores: Vec<&str> = contents
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').next())
            .collect();
        assert_eq!(stores, vec!["a", "b"]);
        assert!(record.finished_at.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn source_failure_marks_report_failed_without_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let runner = runner(Arc::new(UnavailableSource::new("offline")), "failed")?;
        let reports = RwLock::new(AppState::new());
        reports
            .write()
            .map_err(|_| AppError::StateLock)?
            .create_report("r-2", Utc::now())?;

        let record = runner.complete(&reports, "r-2").await?;

        assert_eq!(record.status.label(), "Failed");
        assert!(!artifact::artifact_path(runner.output_dir(), "r-2").exists());
        Ok(())
    }
}
