//! Intersection of a status timeline with a store's recurring business hours.

use crate::estimation::model::{Schedule, StoreStatus};
use crate::estimation::timeline::Timeline;
use chrono::offset::LocalResult;
use chrono::{DateTime, Datelike, Days, Duration, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Longest DST gap we step over when a local wall-clock time does not exist.
const MAX_GAP_MINUTES: i64 = 180;

/// A business-hours interval in absolute time, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl BusinessInterval {
    pub fn minutes(&self) -> f64 {
        minutes_between(self.start, self.end)
    }
}

/// Uptime and downtime in fractional minutes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attribution {
    pub uptime_minutes: f64,
    pub downtime_minutes: f64,
}

impl Attribution {
    pub fn total_minutes(&self) -> f64 {
        self.uptime_minutes + self.downtime_minutes
    }

    fn add(&mut self, status: StoreStatus, minutes: f64) {
        match status {
            StoreStatus::Active => self.uptime_minutes += minutes,
            StoreStatus::Inactive => self.downtime_minutes += minutes,
        }
    }
}

pub fn minutes_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / 60_000.0
}

/// Business hours of `schedule` overlapping `[window_start, window_end]`,
/// merged into disjoint intervals sorted by start and clipped to the window.
pub fn business_intervals(
    schedule: &Schedule,
    tz: Tz,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> Vec<BusinessInterval> {
    if window_end <= window_start {
        return Vec::new();
    }

    // Overnight rules of the day before the window can still reach into it.
    let first_date = window_start.with_timezone(&tz).date_naive();
    let first_date = first_date.pred_opt().unwrap_or(first_date);
    let last_date = window_end.with_timezone(&tz).date_naive();

    let mut intervals = Vec::new();
    let mut date = first_date;
    while date <= last_date {
        for rule in schedule.rules_for(date.weekday()) {
            let end_date = if rule.crosses_midnight() {
                match date.checked_add_days(Days::new(1)) {
                    Some(next) => next,
                    None => continue,
                }
            } else {
                date
            };
            let start = resolve_local(tz, date.and_time(rule.start_local));
            let end = resolve_local(tz, end_date.and_time(rule.end_local));

            let start = start.max(window_start);
            let end = end.min(window_end);
            if start < end {
                intervals.push(BusinessInterval { start, end });
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    merge_intervals(intervals)
}

/// Sort and coalesce overlapping or touching intervals.
pub fn merge_intervals(mut intervals: Vec<BusinessInterval>) -> Vec<BusinessInterval> {
    intervals.sort_by_key(|interval| (interval.start, interval.end));

    let mut merged: Vec<BusinessInterval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(last) if interval.start <= last.end => {
                last.end = last.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Attribute the overlap of each business interval with the timeline to
/// uptime or downtime, per the status of the overlapping segment.
pub fn intersect(timeline: &Timeline, intervals: &[BusinessInterval]) -> Attribution {
    let mut attribution = Attribution::default();
    let segments: Vec<_> = timeline.segments().collect();
    let mut first_segment = 0;

    for interval in intervals {
        // Both sides are sorted and disjoint, so segments ending before this
        // interval can never overlap a later one.
        while first_segment < segments.len() && segments[first_segment].end <= interval.start {
            first_segment += 1;
        }
        for segment in &segments[first_segment..] {
            if segment.start >= interval.end {
                break;
            }
            let start = segment.start.max(interval.start);
            let end = segment.end.min(interval.end);
            if start < end {
                attribution.add(segment.status, minutes_between(start, end));
            }
        }
    }

    attribution
}

/// Uptime and downtime of `timeline` restricted to the store's business hours.
pub fn attribute(timeline: &Timeline, schedule: &Schedule, tz: Tz) -> Attribution {
    let intervals = business_intervals(schedule, tz, timeline.start(), timeline.end());
    intersect(timeline, &intervals)
}

/// Map a local wall-clock time to UTC. Ambiguous times (clocks falling back)
/// take the earlier instant; times inside a spring-forward gap move to the
/// first minute that exists after the gap.
pub fn resolve_local(tz: Tz, local: NaiveDateTime) -> DateTime<Utc> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(datetime) => datetime.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            for step in 1..=MAX_GAP_MINUTES {
                let shifted = local + Duration::minutes(step);
                if let Some(datetime) = tz.from_local_datetime(&shifted).earliest() {
                    return datetime.with_timezone(&Utc);
                }
            }
            local.and_utc()
        }
    }
}
