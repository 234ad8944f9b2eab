//! CSV ingestion of observations, business hours and timezone assignments.
//!
//! Malformed rows are skipped and counted rather than failing the load; only
//! an unreadable required file is an error.

use crate::estimation::model::{AvailabilityRule, Observation, StoreStatus};
use crate::source::memory::{MemoryObservationSource, MemoryReferenceData};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Row counts of one ingested file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestSummary {
    pub rows_read: usize,
    pub rows_kept: usize,
    pub rows_skipped: usize,
}

impl IngestSummary {
    fn kept(&mut self) {
        self.rows_read += 1;
        self.rows_kept += 1;
    }

    fn skipped(&mut self) {
        self.rows_read += 1;
        self.rows_skipped += 1;
    }
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    store_id: String,
    timestamp_utc: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct HoursRow {
    store_id: String,
    #[serde(alias = "dayOfWeek")]
    day_of_week: i64,
    start_time_local: String,
    end_time_local: String,
}

#[derive(Debug, Deserialize)]
struct TimezoneRow {
    store_id: String,
    timezone_str: String,
}

/// Parse an observation timestamp. Accepts RFC 3339 and the
/// `YYYY-MM-DD HH:MM:SS[.ffffff] UTC` export format; a missing offset means UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.with_timezone(&Utc));
    }
    let naive = trimmed
        .strip_suffix("UTC")
        .map(str::trim_end)
        .unwrap_or(trimmed);
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}

fn open(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })
}

pub fn load_observations(
    path: impl AsRef<Path>,
) -> Result<(MemoryObservationSource, IngestSummary), LoadError> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    let mut summary = IngestSummary::default();
    let mut observations = Vec::new();

    for record in reader.deserialize::<StatusRow>() {
        let row = match record {
            Ok(row) => row,
            Err(err) => {
                debug!(error = %err, "Skipping unreadable status row");
                summary.skipped();
                continue;
            }
        };
        let (Some(timestamp), Some(status)) = (
            parse_timestamp(&row.timestamp_utc),
            StoreStatus::parse(&row.status),
        ) else {
            debug!(
                store_id = %row.store_id,
                timestamp = %row.timestamp_utc,
                status = %row.status,
                "Skipping malformed status row"
            );
            summary.skipped();
            continue;
        };
        observations.push(Observation::new(row.store_id, timestamp, status));
        summary.kept();
    }

    if summary.rows_skipped > 0 {
        warn!(
            path = %path.display(),
            skipped = summary.rows_skipped,
            "Status rows skipped during ingestion"
        );
    }
    info!(
        path = %path.display(),
        rows = summary.rows_kept,
        "Loaded store status observations"
    );
    Ok((MemoryObservationSource::new(observations), summary))
}

/// Load business hours into `reference`. Rules with an unparseable day or
/// time of day are skipped; the store's remaining rules still apply, and a
/// store left with no usable rule is closed rather than always open.
pub fn load_business_hours(
    path: impl AsRef<Path>,
    reference: &mut MemoryReferenceData,
) -> Result<IngestSummary, LoadError> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    let mut summary = IngestSummary::default();

    for record in reader.deserialize::<HoursRow>() {
        let row = match record {
            Ok(row) => row,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable business hours row");
                summary.skipped();
                continue;
            }
        };
        match AvailabilityRule::parse(row.day_of_week, &row.start_time_local, &row.end_time_local) {
            Ok(rule) => {
                reference.add_rule(row.store_id, rule);
                summary.kept();
            }
            Err(err) => {
                warn!(store_id = %row.store_id, error = %err, "Skipping malformed business hours rule");
                reference.register_store(row.store_id);
                summary.skipped();
            }
        }
    }

    info!(
        path = %path.display(),
        rules = summary.rows_kept,
        skipped = summary.rows_skipped,
        "Loaded business hours"
    );
    Ok(summary)
}

/// Load timezone assignments into `reference`. Unknown zone names are
/// skipped so the store falls back to the default zone.
pub fn load_timezones(
    path: impl AsRef<Path>,
    reference: &mut MemoryReferenceData,
) -> Result<IngestSummary, LoadError> {
    let path = path.as_ref();
    let mut reader = open(path)?;
    let mut summary = IngestSummary::default();

    for record in reader.deserialize::<TimezoneRow>() {
        let row = match record {
            Ok(row) => row,
            Err(err) => {
                warn!(error = %err, "Skipping unreadable timezone row");
                summary.skipped();
                continue;
            }
        };
        match row.timezone_str.parse::<Tz>() {
            Ok(tz) => {
                reference.set_timezone(row.store_id, tz);
                summary.kept();
            }
            Err(_) => {
                warn!(
                    store_id = %row.store_id,
                    timezone = %row.timezone_str,
                    default = %reference.default_timezone(),
                    "Unknown timezone; store will use the default"
                );
                summary.skipped();
            }
        }
    }

    info!(
        path = %path.display(),
        stores = summary.rows_kept,
        skipped = summary.rows_skipped,
        "Loaded timezones"
    );
    Ok(summary)
}

/// Load the optional reference files. A path that is not configured or does
/// not exist leaves that part of the reference data empty.
pub fn load_reference_data(
    business_hours: Option<&Path>,
    timezones: Option<&Path>,
    default_timezone: Tz,
) -> Result<MemoryReferenceData, LoadError> {
    let mut reference = MemoryReferenceData::new(default_timezone);

    match business_hours {
        Some(path) if path.exists() => {
            load_business_hours(path, &mut reference)?;
        }
        Some(path) => {
            warn!(path = %path.display(), "Business hours file missing; all stores treated as always open");
        }
        None => info!("No business hours configured; all stores treated as always open"),
    }

    match timezones {
        Some(path) if path.exists() => {
            load_timezones(path, &mut reference)?;
        }
        Some(path) => {
            warn!(path = %path.display(), default = %default_timezone, "Timezone file missing; using default zone");
        }
        None => info!(default = %default_timezone, "No timezones configured; using default zone"),
    }

    Ok(reference)
}
