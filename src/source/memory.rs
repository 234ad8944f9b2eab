use crate::estimation::model::{AvailabilityRule, Observation, Schedule, StoreId};
use crate::source::{
    DEFAULT_TIMEZONE, ObservationSource, ScheduleResolver, SourceError, TimezoneResolver,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Observations held in memory, indexed by store.
#[derive(Debug, Default, Clone)]
pub struct MemoryObservationSource {
    by_store: HashMap<StoreId, Vec<Observation>>,
    latest: Option<DateTime<Utc>>,
}

impl MemoryObservationSource {
    pub fn new(observations: Vec<Observation>) -> Self {
        let mut source = Self::default();
        source.extend(observations);
        source
    }

    pub fn extend(&mut self, observations: impl IntoIterator<Item = Observation>) {
        for observation in observations {
            self.latest = Some(match self.latest {
                Some(latest) => latest.max(observation.timestamp),
                None => observation.timestamp,
            });
            self.by_store
                .entry(observation.store_id.clone())
                .or_default()
                .push(observation);
        }
    }

    pub fn len(&self) -> usize {
        self.by_store.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_store.is_empty()
    }
}

#[async_trait]
impl ObservationSource for MemoryObservationSource {
    async fn store_ids(&self) -> Result<Vec<StoreId>, SourceError> {
        let ordered: BTreeSet<&StoreId> = self.by_store.keys().collect();
        Ok(ordered.into_iter().cloned().collect())
    }

    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, SourceError> {
        Ok(self.latest)
    }

    async fn observations(
        &self,
        store_ids: &[StoreId],
        since: DateTime<Utc>,
    ) -> Result<Vec<Observation>, SourceError> {
        let wanted: HashSet<&StoreId> = store_ids.iter().collect();
        Ok(wanted
            .into_iter()
            .filter_map(|store_id| self.by_store.get(store_id))
            .flatten()
            .filter(|obs| obs.timestamp >= since)
            .cloned()
            .collect())
    }
}

/// Timezone assignments and business-hours rules held in memory.
#[derive(Debug, Clone)]
pub struct MemoryReferenceData {
    default_timezone: Tz,
    timezones: HashMap<StoreId, Tz>,
    rules: HashMap<StoreId, Vec<AvailabilityRule>>,
}

impl MemoryReferenceData {
    pub fn new(default_timezone: Tz) -> Self {
        Self {
            default_timezone,
            timezones: HashMap::new(),
            rules: HashMap::new(),
        }
    }

    pub fn default_timezone(&self) -> Tz {
        self.default_timezone
    }

    pub fn set_timezone(&mut self, store_id: impl Into<StoreId>, timezone: Tz) {
        self.timezones.insert(store_id.into(), timezone);
    }

    pub fn add_rule(&mut self, store_id: impl Into<StoreId>, rule: AvailabilityRule) {
        self.rules.entry(store_id.into()).or_default().push(rule);
    }

    /// Record that the store has business-hours rows even when none of them
    /// produced a usable rule. Such a store is never open rather than always open.
    pub fn register_store(&mut self, store_id: impl Into<StoreId>) {
        self.rules.entry(store_id.into()).or_default();
    }

    pub fn timezone_count(&self) -> usize {
        self.timezones.len()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}

impl Default for MemoryReferenceData {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl TimezoneResolver for MemoryReferenceData {
    fn timezone(&self, store_id: &str) -> Tz {
        self.timezones
            .get(store_id)
            .copied()
            .unwrap_or(self.default_timezone)
    }
}

impl ScheduleResolver for MemoryReferenceData {
    /// Stores without any rows are always open; stores with rows get exactly
    /// their usable rules, possibly none.
    fn schedule(&self, store_id: &str) -> Schedule {
        match self.rules.get(store_id) {
            Some(rules) => Schedule::new(rules.clone()),
            None => Schedule::always_open(),
        }
    }
}

/// Source whose every query fails, for exercising the upstream-failure path.
#[derive(Debug, Clone)]
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ObservationSource for UnavailableSource {
    async fn store_ids(&self) -> Result<Vec<StoreId>, SourceError> {
        Err(SourceError::Unavailable(self.reason.clone()))
    }

    async fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, SourceError> {
        Err(SourceError::Unavailable(self.reason.clone()))
    }

    async fn observations(
        &self,
        _store_ids: &[StoreId],
        _since: DateTime<Utc>,
    ) -> Result<Vec<Observation>, SourceError> {
        Err(SourceError::Unavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::model::StoreStatus;
    use chrono::{NaiveTime, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 25, hour, 0, 0).single().expect("valid instant")
    }

    #[tokio::test]
    async fn observations_are_filtered_by_store_and_since() -> Result<(), SourceError> {
        let source = MemoryObservationSource::new(vec![
            Observation::new("a", at(1), StoreStatus::Active),
            Observation::new("a", at(5), StoreStatus::Inactive),
            Observation::new("b", at(6), StoreStatus::Active),
            Observation::new("c", at(7), StoreStatus::Active),
        ]);

        let observations = source
            .observations(&["a".to_string(), "b".to_string()], at(2))
            .await?;

        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|obs| obs.timestamp >= at(2)));
        assert!(observations.iter().all(|obs| obs.store_id != "c"));
        assert_eq!(source.latest_timestamp().await?, Some(at(7)));
        assert_eq!(source.store_ids().await?, vec!["a", "b", "c"]);
        assert_eq!(source.len(), 4);
        Ok(())
    }

    #[tokio::test]
    async fn empty_source_has_no_reference_instant() -> Result<(), SourceError> {
        let source = MemoryObservationSource::default();

        assert!(source.is_empty());
        assert_eq!(source.latest_timestamp().await?, None);
        assert!(source.store_ids().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_source_fails_every_query() {
        let source = UnavailableSource::new("connection refused");

        let err = source.store_ids().await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "observation source unavailable: connection refused"
        );
        assert!(source.latest_timestamp().await.is_err());
        assert!(source.observations(&[], at(0)).await.is_err());
    }

    #[test]
    fn missing_reference_data_falls_back_to_defaults() {
        let mut reference = MemoryReferenceData::default();
        reference.set_timezone("known", chrono_tz::Asia::Kolkata);
        let rule = AvailabilityRule::new(
            3,
            NaiveTime::from_hms_opt(8, 0, 0).expect("valid time"),
            NaiveTime::from_hms_opt(20, 0, 0).expect("valid time"),
        )
        .expect("valid rule");
        reference.add_rule("known", rule);

        assert_eq!(reference.timezone("known"), chrono_tz::Asia::Kolkata);
        assert_eq!(reference.timezone("unknown"), DEFAULT_TIMEZONE);
        assert_eq!(reference.schedule("known").rules(), &[rule]);
        assert_eq!(reference.schedule("unknown"), Schedule::always_open());
    }

    #[test]
    fn registered_store_without_rules_is_closed() {
        let mut reference = MemoryReferenceData::default();
        reference.register_store("broken");

        assert_eq!(reference.schedule("broken"), Schedule::closed());
        assert_eq!(reference.rule_count(), 0);
        assert_eq!(reference.schedule("other"), Schedule::always_open());
    }
}
