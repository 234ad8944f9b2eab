//! Interval estimation engine.
//!
//! Sparse status polls become a step-function timeline per store and window
//! (`timeline`), which is intersected with the store's weekly business hours in
//! its local timezone (`schedule`). `window` drives both for the trailing hour,
//! day and week, and `batch` runs that over every store.

pub mod batch;
pub mod model;
pub mod schedule;
pub mod timeline;
pub mod window;

pub use batch::{BatchCoordinator, BatchSettings};
pub use model::{
    AvailabilityRule, MetricRow, Observation, Schedule, StoreId, StoreStatus, TrailingWindow,
    WindowMetrics,
};
pub use window::{StoreInputs, store_metrics};
