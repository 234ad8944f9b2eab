//! Per-store aggregation over the trailing hour, day and week.

use crate::estimation::model::{MetricRow, Observation, Schedule, TrailingWindow, WindowMetrics};
use crate::estimation::schedule::{Attribution, attribute};
use crate::estimation::timeline::build_timeline;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::debug;

/// Everything needed to compute one store's row.
#[derive(Debug, Clone, Copy)]
pub struct StoreInputs<'a> {
    pub store_id: &'a str,
    /// Observations sorted by timestamp (stable, arrival order kept for ties).
    pub observations: &'a [Observation],
    pub timezone: Tz,
    pub schedule: &'a Schedule,
}

/// Raw business-hours attribution for one window, or `None` when the window
/// has no observation to extrapolate from.
pub fn window_attribution(
    inputs: &StoreInputs<'_>,
    window: TrailingWindow,
    now: DateTime<Utc>,
) -> Option<Attribution> {
    let start = now - window.duration();
    let observations = inputs.observations;

    let first_in_window = observations.partition_point(|obs| obs.timestamp < start);
    let past_window = observations.partition_point(|obs| obs.timestamp <= now);
    let prior = first_in_window.checked_sub(1).map(|idx| &observations[idx]);
    let in_window = &observations[first_in_window..past_window.max(first_in_window)];

    let timeline = build_timeline(start, now, prior, in_window)?;
    Some(attribute(&timeline, inputs.schedule, inputs.timezone))
}

/// Reported metrics for one window: minutes for the hour, hours otherwise.
pub fn window_metrics(inputs: &StoreInputs<'_>, window: TrailingWindow, now: DateTime<Utc>) -> WindowMetrics {
    match window_attribution(inputs, window, now) {
        Some(attribution) => WindowMetrics {
            uptime: report_value(window, attribution.uptime_minutes),
            downtime: report_value(window, attribution.downtime_minutes),
        },
        None => {
            debug!(
                store_id = inputs.store_id,
                window = window.label(),
                "No observations for window; reporting as unknown"
            );
            WindowMetrics::default()
        }
    }
}

pub fn store_metrics(inputs: &StoreInputs<'_>, now: DateTime<Utc>) -> MetricRow {
    let mut row = MetricRow::empty(inputs.store_id);
    for window in TrailingWindow::ALL {
        row.set_window(window, window_metrics(inputs, window, now));
    }
    row
}

/// Convert minutes to the window's unit and round: whole minutes for the
/// hour, two decimals of an hour for the day and week.
pub fn report_value(window: TrailingWindow, minutes: f64) -> f64 {
    match window {
        TrailingWindow::LastHour => minutes.round(),
        TrailingWindow::LastDay | TrailingWindow::LastWeek => {
            round_to_hundredths(minutes / window.minutes_per_unit())
        }
    }
}

pub fn round_to_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::model::{AvailabilityRule, StoreStatus};
    use chrono::{Duration, NaiveTime, TimeZone};

    fn utc(d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, d, h, mi, 0).single().expect("valid instant")
    }

    fn inputs<'a>(observations: &'a [Observation], schedule: &'a Schedule) -> StoreInputs<'a> {
        StoreInputs {
            store_id: "store-1",
            observations,
            timezone: Tz::UTC,
            schedule,
        }
    }

    #[test]
    fn half_active_half_inactive_hour() {
        let schedule = Schedule::always_open();
        let observations = vec![
            Observation::new("store-1", utc(25, 0, 0), StoreStatus::Active),
            Observation::new("store-1", utc(25, 0, 30), StoreStatus::Inactive),
        ];

        let row = store_metrics(&inputs(&observations, &schedule), utc(25, 1, 0));

        assert_eq!(row.last_hour, WindowMetrics { uptime: 30.0, downtime: 30.0 });
        // Day and week seed from the earliest observation and pad back to the
        // window start: 23h of active plus 30 minutes before switching.
        assert_eq!(row.last_day, WindowMetrics { uptime: 23.5, downtime: 0.5 });
        assert_eq!(row.last_week.uptime + row.last_week.downtime, 168.0);
    }

    #[test]
    fn no_observations_reports_zero_everywhere() {
        let schedule = Schedule::always_open();

        let row = store_metrics(&inputs(&[], &schedule), utc(25, 1, 0));

        assert_eq!(row, MetricRow::empty("store-1"));
    }

    #[test]
    fn single_active_observation_fills_the_hour() {
        let schedule = Schedule::always_open();
        let observations = vec![Observation::new("store-1", utc(25, 12, 20), StoreStatus::Active)];

        let metrics = window_metrics(&inputs(&observations, &schedule), TrailingWindow::LastHour, utc(25, 12, 40));

        assert_eq!(metrics, WindowMetrics { uptime: 60.0, downtime: 0.0 });
    }

    #[test]
    fn single_observation_outside_business_hours_counts_nothing() -> Result<(), Box<dyn std::error::Error>> {
        // 2023-01-25 is a Wednesday; the store only opens on Mondays.
        let schedule = Schedule::new(vec![AvailabilityRule::new(
            1,
            NaiveTime::from_hms_opt(9, 0, 0).ok_or("time")?,
            NaiveTime::from_hms_opt(17, 0, 0).ok_or("time")?,
        )?]);
        let observations = vec![Observation::new("store-1", utc(25, 12, 20), StoreStatus::Active)];

        let metrics = window_metrics(&inputs(&observations, &schedule), TrailingWindow::LastHour, utc(25, 12, 40));

        assert_eq!(metrics, WindowMetrics::default());
        Ok(())
    }

    #[test]
    fn prior_observation_seeds_the_hour() {
        let schedule = Schedule::always_open();
        let observations = vec![
            Observation::new("store-1", utc(25, 10, 0), StoreStatus::Inactive),
            Observation::new("store-1", utc(25, 11, 45), StoreStatus::Active),
        ];

        let metrics = window_metrics(&inputs(&observations, &schedule), TrailingWindow::LastHour, utc(25, 12, 0));

        assert_eq!(metrics, WindowMetrics { uptime: 15.0, downtime: 45.0 });
    }

    #[test]
    fn observations_after_now_are_ignored() {
        let schedule = Schedule::always_open();
        let observations = vec![
            Observation::new("store-1", utc(25, 11, 30), StoreStatus::Active),
            Observation::new("store-1", utc(25, 12, 30), StoreStatus::Inactive),
        ];

        let metrics = window_metrics(&inputs(&observations, &schedule), TrailingWindow::LastHour, utc(25, 12, 0));

        assert_eq!(metrics, WindowMetrics { uptime: 60.0, downtime: 0.0 });
    }

    #[test]
    fn day_values_are_rounded_to_hundredths() {
        let schedule = Schedule::always_open();
        let now = utc(25, 12, 0);
        let observations = vec![
            Observation::new("store-1", now - Duration::days(1), StoreStatus::Active),
            Observation::new("store-1", now - Duration::minutes(7), StoreStatus::Inactive),
        ];

        let metrics = window_metrics(&inputs(&observations, &schedule), TrailingWindow::LastDay, now);

        // 1433 / 60 = 23.8833..., 7 / 60 = 0.11666...
        assert_eq!(metrics, WindowMetrics { uptime: 23.88, downtime: 0.12 });
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let schedule = Schedule::always_open();
        let now = utc(25, 12, 0);
        let observations: Vec<Observation> = (0..200)
            .map(|i| {
                let status = if i % 3 == 0 { StoreStatus::Inactive } else { StoreStatus::Active };
                Observation::new("store-1", now - Duration::minutes(i * 37), status)
            })
            .rev()
            .collect();

        let first = store_metrics(&inputs(&observations, &schedule), now);
        let second = store_metrics(&inputs(&observations, &schedule), now);

        for window in TrailingWindow::ALL {
            assert_eq!(first.window(window).uptime.to_bits(), second.window(window).uptime.to_bits());
            assert_eq!(first.window(window).downtime.to_bits(), second.window(window).downtime.to_bits());
        }
    }

    #[test]
    fn report_value_rounds_per_window_unit() {
        assert_eq!(report_value(TrailingWindow::LastHour, 29.6), 30.0);
        assert_eq!(report_value(TrailingWindow::LastWeek, 90.0), 1.5);
        assert_eq!(round_to_hundredths(2.0 / 3.0), 0.67);
    }
}
