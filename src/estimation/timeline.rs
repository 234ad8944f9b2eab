//! Piecewise-constant status timeline built from sparse polls.
//!
//! Gaps between polls are attributed to the status of the earlier poll
//! (last observation carried forward). The first status is seeded from the
//! nearest poll before the window, or from the earliest poll inside it, and
//! the timeline is padded so it spans the window exactly.

use crate::estimation::model::{Observation, StoreStatus};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelinePoint {
    pub instant: DateTime<Utc>,
    pub status: StoreStatus,
}

/// A half-open interval `[start, end)` held at a single status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub status: StoreStatus,
}

/// Invariant: points are strictly increasing, the first is the window start
/// and the last is the window end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    points: Vec<TimelinePoint>,
}

impl Timeline {
    pub fn points(&self) -> &[TimelinePoint] {
        &self.points
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.points[0].instant
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.points[self.points.len() - 1].instant
    }

    /// Consecutive non-empty segments covering the timeline.
    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        self.points.windows(2).map(|pair| Segment {
            start: pair[0].instant,
            end: pair[1].instant,
            status: pair[0].status,
        })
    }
}

/// Build the timeline for `[window_start, window_end]`.
///
/// `prior` is the latest observation strictly before `window_start`;
/// `in_window` holds the observations inside the closed window, in arrival
/// order. Returns `None` when there is nothing to extrapolate from, which the
/// caller reports as an unknown window rather than downtime.
pub fn build_timeline(
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    prior: Option<&Observation>,
    in_window: &[Observation],
) -> Option<Timeline> {
    if window_end < window_start {
        return None;
    }

    let mut sorted: Vec<TimelinePoint> = in_window
        .iter()
        .filter(|obs| obs.timestamp >= window_start && obs.timestamp <= window_end)
        .map(|obs| TimelinePoint {
            instant: obs.timestamp,
            status: obs.status,
        })
        .collect();
    // Stable: equal instants keep arrival order so the last-seen status wins below.
    sorted.sort_by_key(|point| point.instant);

    let mut real: Vec<TimelinePoint> = Vec::with_capacity(sorted.len() + 2);
    for point in sorted {
        match real.last_mut() {
            Some(last) if last.instant == point.instant => last.status = point.status,
            _ => real.push(point),
        }
    }

    let seed = match (prior, real.first()) {
        (Some(prior), _) => prior.status,
        (None, Some(first)) => first.status,
        (None, None) => return None,
    };

    let mut points = Vec::with_capacity(real.len() + 2);
    if real.first().is_none_or(|first| first.instant > window_start) {
        points.push(TimelinePoint {
            instant: window_start,
            status: seed,
        });
    }
    points.extend(real);

    let tail = points[points.len() - 1];
    if tail.instant < window_end {
        points.push(TimelinePoint {
            instant: window_end,
            status: tail.status,
        });
    }

    Some(Timeline { points })
}
