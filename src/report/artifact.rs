use crate::error::AppError;
use crate::estimation::model::MetricRow;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const ARTIFACT_HEADER: [&str; 7] = [
    "store_id",
    "uptime_last_hour",
    "downtime_last_hour",
    "uptime_last_day",
    "downtime_last_day",
    "uptime_last_week",
    "downtime_last_week",
];

pub fn artifact_path(output_dir: &Path, report_id: &str) -> PathBuf {
    output_dir.join(format!("{report_id}.csv"))
}

fn partial_path(output_dir: &Path, report_id: &str) -> PathBuf {
    output_dir.join(format!(".{report_id}.csv.partial"))
}

/// Hour values are whole minutes.
fn format_minutes(value: f64) -> String {
    format!("{value:.0}")
}

/// Day and week values are hours with two decimals.
fn format_hours(value: f64) -> String {
    format!("{value:.2}")
}

/// Encode rows as CSV, header first, in the order given.
pub fn encode_rows(rows: &[MetricRow]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(ARTIFACT_HEADER)?;
    for row in rows {
        writer.write_record([
            row.store_id.clone(),
            format_minutes(row.last_hour.uptime),
            format_minutes(row.last_hour.downtime),
            format_hours(row.last_day.uptime),
            format_hours(row.last_day.downtime),
            format_hours(row.last_week.uptime),
            format_hours(row.last_week.downtime),
        ])?;
    }
    writer
        .into_inner()
        .map_err(|err| AppError::Artifact(err.into_error()))
}

/// Write the artifact for `report_id` and return its final path. The content
/// lands in a partial file first and is renamed into place, so the final path
/// only ever holds a complete artifact.
pub async fn write_artifact(
    output_dir: &Path,
    report_id: &str,
    rows: &[MetricRow],
) -> Result<PathBuf, AppError> {
    let bytes = encode_rows(rows)?;
    tokio::fs::create_dir_all(output_dir).await?;

    let partial = partial_path(output_dir, report_id);
    let target = artifact_path(output_dir, report_id);
    tokio::fs::write(&partial, bytes).await?;
    if let Err(err) = tokio::fs::rename(&partial, &target).await {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
            warn!(path = %partial.display(), error = %cleanup, "Failed to remove partial artifact");
        }
        return Err(err.into());
    }
    Ok(target)
}
