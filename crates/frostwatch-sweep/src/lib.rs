//! Frost sweep pipeline.
//!
//! A sweep walks a directory snapshot, deduplicates forecast lookups by
//! coordinate through the [`DispatchGate`], evaluates frost and hands alerts
//! to the notifier. The [`SweepScheduler`] repeats this on a fixed interval.

pub mod gate;
pub mod scheduler;
pub mod sweep;

pub use gate::{Admission, DispatchGate};
pub use scheduler::{SchedulerState, SweepScheduler};
pub use sweep::{SweepReport, Sweeper};
