use crate::estimation::model::{Observation, Schedule, StoreId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

pub mod ingest;
pub mod memory;

/// Zone used for stores without a timezone assignment.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Chicago;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("observation source unavailable: {0}")]
    Unavailable(String),
    #[error("observation query failed: {0}")]
    Query(String),
}

/// Read access to the polled store statuses.
#[async_trait]
pub trait ObservationSource: Send + Sync {
    /// Every store with at least one observation.
    async fn store_ids(&self) -> Result<Vec<StoreId>, SourceError>;

    /// Latest observation timestamp across all stores.
    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, SourceError>;

    /// Observations of `store_ids` with `timestamp >= since`, in arrival order.
    async fn observations(
        &self,
        store_ids: &[StoreId],
        since: DateTime<Utc>,
    ) -> Result<Vec<Observation>, SourceError>;
}

pub trait TimezoneResolver: Send + Sync {
    /// Never fails: stores without an assignment get the default zone.
    fn timezone(&self, store_id: &str) -> Tz;
}

pub trait ScheduleResolver: Send + Sync {
    /// Never fails: stores without rules are always open.
    fn schedule(&self, store_id: &str) -> Schedule;
}
