//! Batched, concurrent computation of metric rows for the whole store universe.

use crate::error::AppError;
use crate::estimation::model::{MetricRow, Observation, StoreId, TrailingWindow};
use crate::estimation::window::{StoreInputs, store_metrics};
use crate::source::{ObservationSource, ScheduleResolver, SourceError, TimezoneResolver};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

pub const DEFAULT_BATCH_SIZE: usize = 500;
pub const DEFAULT_MAX_CONCURRENT_BATCHES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Stores per observation fetch; bounds peak memory.
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_concurrent_batches: DEFAULT_MAX_CONCURRENT_BATCHES,
        }
    }
}

#[derive(Clone)]
pub struct BatchCoordinator {
    source: Arc<dyn ObservationSource>,
    timezones: Arc<dyn TimezoneResolver>,
    schedules: Arc<dyn ScheduleResolver>,
    settings: BatchSettings,
}

impl BatchCoordinator {
    pub fn new(
        source: Arc<dyn ObservationSource>,
        timezones: Arc<dyn TimezoneResolver>,
        schedules: Arc<dyn ScheduleResolver>,
        settings: BatchSettings,
    ) -> Self {
        Self {
            source,
            timezones,
            schedules,
            settings,
        }
    }

    pub fn settings(&self) -> BatchSettings {
        self.settings
    }

    /// The reference instant "now": the latest observation in the dataset.
    pub async fn reference_instant(&self) -> Result<Option<DateTime<Utc>>, SourceError> {
        self.source.latest_timestamp().await
    }

    /// Compute one row per store relative to `now`. Any fetch failure aborts
    /// the whole run; outstanding batches are cancelled when the set drops.
    pub async fn run(&self, now: DateTime<Utc>) -> Result<Vec<MetricRow>, AppError> {
        let store_ids = self.source.store_ids().await?;
        let since = now - TrailingWindow::LastWeek.duration();
        let batch_size = self.settings.batch_size.max(1);
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_batches.max(1)));

        info!(
            stores = store_ids.len(),
            batch_size,
            now = %now,
            "Computing store metrics"
        );

        let mut tasks = JoinSet::new();
        for (index, chunk) in store_ids.chunks(batch_size).enumerate() {
            let batch = chunk.to_vec();
            let source = Arc::clone(&self.source);
            let timezones = Arc::clone(&self.timezones);
            let schedules = Arc::clone(&self.schedules);
            let permits = Arc::clone(&permits);

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| AppError::Worker("batch permits closed".to_string()))?;
                let observations = source.observations(&batch, since).await?;
                debug!(
                    batch = index,
                    stores = batch.len(),
                    observations = observations.len(),
                    "Fetched observation batch"
                );
                let rows = tokio::task::spawn_blocking(move || {
                    compute_batch(&batch, observations, timezones.as_ref(), schedules.as_ref(), now)
                })
                .await
                .map_err(|err| AppError::Worker(err.to_string()))?;
                Ok::<Vec<MetricRow>, AppError>(rows)
            });
        }

        let mut rows = Vec::with_capacity(store_ids.len());
        while let Some(joined) = tasks.join_next().await {
            let batch_rows = joined.map_err(|err| AppError::Worker(err.to_string()))??;
            rows.extend(batch_rows);
        }
        Ok(rows)
    }
}

/// Compute rows for one batch. Stores without observations still get a row
/// of zeros.
pub fn compute_batch(
    store_ids: &[StoreId],
    observations: Vec<Observation>,
    timezones: &dyn TimezoneResolver,
    schedules: &dyn ScheduleResolver,
    now: DateTime<Utc>,
) -> Vec<MetricRow> {
    let mut by_store: HashMap<StoreId, Vec<Observation>> = HashMap::with_capacity(store_ids.len());
    for observation in observations {
        by_store
            .entry(observation.store_id.clone())
            .or_default()
            .push(observation);
    }

    store_ids
        .iter()
        .map(|store_id| {
            let mut store_observations = by_store.remove(store_id).unwrap_or_default();
            store_observations.sort_by_key(|obs| obs.timestamp);
            let schedule = schedules.schedule(store_id);
            let inputs = StoreInputs {
                store_id,
                observations: &store_observations,
                timezone: timezones.timezone(store_id),
                schedule: &schedule,
            };
            store_metrics(&inputs, now)
        })
        .collect()
}
