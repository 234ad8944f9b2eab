//! Domain types shared by the timeline builder, schedule intersector and
//! window aggregator.

use chrono::{DateTime, Duration, NaiveTime, Utc, Weekday};
use thiserror::Error;

pub type StoreId = String;

/// Polled state of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreStatus {
    Active,
    Inactive,
}

impl StoreStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub store_id: StoreId,
    pub timestamp: DateTime<Utc>,
    pub status: StoreStatus,
}

impl Observation {
    pub fn new(store_id: impl Into<StoreId>, timestamp: DateTime<Utc>, status: StoreStatus) -> Self {
        Self {
            store_id: store_id.into(),
            timestamp,
            status,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("day_of_week out of range: {0}")]
    DayOfWeek(i64),
    #[error("malformed time of day: {0:?}")]
    TimeOfDay(String),
}

/// One recurring weekly business-hours interval in the store's local time.
///
/// `day_of_week` is 0 = Sunday through 6 = Saturday. When `end_local <= start_local`
/// the interval runs past midnight into the following day, so `00:00-00:00`
/// covers the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvailabilityRule {
    pub day_of_week: u8,
    pub start_local: NaiveTime,
    pub end_local: NaiveTime,
}

impl AvailabilityRule {
    pub fn new(day_of_week: u8, start_local: NaiveTime, end_local: NaiveTime) -> Result<Self, RuleError> {
        if day_of_week > 6 {
            return Err(RuleError::DayOfWeek(i64::from(day_of_week)));
        }
        Ok(Self {
            day_of_week,
            start_local,
            end_local,
        })
    }

    /// Parse a rule from raw ingestion values.
    pub fn parse(day_of_week: i64, start_local: &str, end_local: &str) -> Result<Self, RuleError> {
        let day = u8::try_from(day_of_week)
            .ok()
            .filter(|day| *day <= 6)
            .ok_or(RuleError::DayOfWeek(day_of_week))?;
        Self::new(day, parse_time_of_day(start_local)?, parse_time_of_day(end_local)?)
    }

    pub fn full_day(day_of_week: u8) -> Self {
        Self {
            day_of_week: day_of_week.min(6),
            start_local: NaiveTime::MIN,
            end_local: NaiveTime::MIN,
        }
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end_local <= self.start_local
    }

    pub fn applies_to(&self, weekday: Weekday) -> bool {
        u32::from(self.day_of_week) == weekday.num_days_from_sunday()
    }
}

/// Accepts `HH:MM` and `HH:MM:SS`, with optional fractional seconds.
pub fn parse_time_of_day(raw: &str) -> Result<NaiveTime, RuleError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M"))
        .map_err(|_| RuleError::TimeOfDay(raw.to_string()))
}

/// Weekly availability of one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    rules: Vec<AvailabilityRule>,
}

impl Schedule {
    /// An empty rule list is never open; see `always_open` for stores
    /// without any business-hours rows.
    pub fn new(rules: Vec<AvailabilityRule>) -> Self {
        Self { rules }
    }

    /// Schedule of a store whose business-hours rows were all unusable.
    pub fn closed() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn always_open() -> Self {
        Self {
            rules: (0..7).map(AvailabilityRule::full_day).collect(),
        }
    }

    pub fn rules(&self) -> &[AvailabilityRule] {
        &self.rules
    }

    pub fn rules_for(&self, weekday: Weekday) -> impl Iterator<Item = &AvailabilityRule> {
        self.rules.iter().filter(move |rule| rule.applies_to(weekday))
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::always_open()
    }
}

/// The three trailing windows reported per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrailingWindow {
    LastHour,
    LastDay,
    LastWeek,
}

impl TrailingWindow {
    pub const ALL: [TrailingWindow; 3] = [Self::LastHour, Self::LastDay, Self::LastWeek];

    pub fn duration(self) -> Duration {
        match self {
            Self::LastHour => Duration::hours(1),
            Self::LastDay => Duration::days(1),
            Self::LastWeek => Duration::weeks(1),
        }
    }

    /// Divisor converting minutes into the unit the window is reported in.
    pub fn minutes_per_unit(self) -> f64 {
        match self {
            Self::LastHour => 1.0,
            Self::LastDay | Self::LastWeek => 60.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::LastHour => "last_hour",
            Self::LastDay => "last_day",
            Self::LastWeek => "last_week",
        }
    }
}

/// Uptime and downtime of one window in the window's reporting unit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowMetrics {
    pub uptime: f64,
    pub downtime: f64,
}

/// One artifact row: all three windows of a single store.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub store_id: StoreId,
    pub last_hour: WindowMetrics,
    pub last_day: WindowMetrics,
    pub last_week: WindowMetrics,
}

impl MetricRow {
    pub fn empty(store_id: impl Into<StoreId>) -> Self {
        Self {
            store_id: store_id.into(),
            last_hour: WindowMetrics::default(),
            last_day: WindowMetrics::default(),
            last_week: WindowMetrics::default(),
        }
    }

    pub fn window(&self, window: TrailingWindow) -> WindowMetrics {
        match window {
            TrailingWindow::LastHour => self.last_hour,
            TrailingWindow::LastDay => self.last_day,
            TrailingWindow::LastWeek => self.last_week,
        }
    }

    pub fn set_window(&mut self, window: TrailingWindow, metrics: WindowMetrics) {
        match window {
            TrailingWindow::LastHour => self.last_hour = metrics,
            TrailingWindow::LastDay => self.last_day = metrics,
            TrailingWindow::LastWeek => self.last_week = metrics,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_is_case_insensitive() {
        assert_eq!(StoreStatus::parse(" Active"), Some(StoreStatus::Active));
        assert_eq!(StoreStatus::parse("INACTIVE"), Some(StoreStatus::Inactive));
        assert_eq!(StoreStatus::parse("unknown"), None);
    }

    #[test]
    fn rule_parse_accepts_seconds_and_minutes() -> Result<(), RuleError> {
        let rule = AvailabilityRule::parse(2, "09:00:00", "17:30")?;

        assert_eq!(rule.day_of_week, 2);
        assert_eq!(rule.start_local, NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"));
        assert_eq!(rule.end_local, NaiveTime::from_hms_opt(17, 30, 0).expect("valid time"));
        assert!(!rule.crosses_midnight());
        Ok(())
    }

    #[test]
    fn rule_parse_rejects_bad_time_and_day() {
        assert_eq!(
            AvailabilityRule::parse(1, "9am", "17:00"),
            Err(RuleError::TimeOfDay("9am".to_string()))
        );
        assert_eq!(
            AvailabilityRule::parse(7, "09:00", "17:00"),
            Err(RuleError::DayOfWeek(7))
        );
        assert_eq!(
            AvailabilityRule::parse(-1, "09:00", "17:00"),
            Err(RuleError::DayOfWeek(-1))
        );
    }

    #[test]
    fn always_open_has_a_full_day_per_weekday() {
        let schedule = Schedule::default();

        assert_eq!(schedule, Schedule::always_open());
        assert_eq!(schedule.rules().len(), 7);
        assert!(schedule.rules().iter().all(AvailabilityRule::crosses_midnight));
        assert_eq!(schedule.rules_for(Weekday::Sun).count(), 1);
    }

    #[test]
    fn empty_rule_list_is_closed() {
        let schedule = Schedule::new(Vec::new());

        assert_eq!(schedule, Schedule::closed());
        assert_ne!(schedule, Schedule::always_open());
        assert_eq!(schedule.rules_for(Weekday::Mon).count(), 0);
    }

    #[test]
    fn day_zero_is_sunday() -> Result<(), RuleError> {
        let sunday = AvailabilityRule::parse(0, "12:00", "13:00")?;
        let monday = AvailabilityRule::parse(1, "12:00", "13:00")?;

        assert!(sunday.applies_to(Weekday::Sun));
        assert!(!sunday.applies_to(Weekday::Mon));
        assert!(monday.applies_to(Weekday::Mon));
        assert!(AvailabilityRule::parse(6, "12:00", "13:00")?.applies_to(Weekday::Sat));
        Ok(())
    }

    #[test]
    fn window_units() {
        assert_eq!(TrailingWindow::LastHour.minutes_per_unit(), 1.0);
        assert_eq!(TrailingWindow::LastWeek.minutes_per_unit(), 60.0);
        assert_eq!(TrailingWindow::LastDay.duration(), Duration::hours(24));
    }
}
