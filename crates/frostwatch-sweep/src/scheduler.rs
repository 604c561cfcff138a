//! Recurring sweep task.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::sweep::{SweepReport, Sweeper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Sweeping,
}

/// Runs a sweep immediately, then once per interval, until cancelled.
///
/// Cancellation is observed between sweeps; a sweep in flight always runs
/// to completion.
pub struct SweepScheduler {
    sweeper: Sweeper,
    period: Duration,
    state: RwLock<SchedulerState>,
    last_report: RwLock<Option<SweepReport>>,
    completed: AtomicU64,
}

impl SweepScheduler {
    pub fn new(sweeper: Sweeper, period: Duration) -> Self {
        Self {
            sweeper,
            period,
            state: RwLock::new(SchedulerState::Idle),
            last_report: RwLock::new(None),
            completed: AtomicU64::new(0),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Report of the most recent completed sweep.
    pub fn last_report(&self) -> Option<SweepReport> {
        self.last_report.read().clone()
    }

    pub fn sweeps_completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Run one sweep, tracking state.
    pub async fn sweep_now(&self) -> SweepReport {
        *self.state.write() = SchedulerState::Sweeping;
        let report = self.sweeper.run_once().await;
        *self.state.write() = SchedulerState::Idle;

        *self.last_report.write() = Some(report.clone());
        self.completed.fetch_add(1, Ordering::SeqCst);
        report
    }

    /// Loop until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        tracing::info!("Sweep scheduler started (every {:?})", self.period);

        let mut ticker = interval(self.period.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.sweep_now().await;
                }
            }
        }

        tracing::info!(
            "Sweep scheduler stopped after {} sweeps",
            self.sweeps_completed()
        );
    }

    /// Spawn [`SweepScheduler::run`] on the current runtime.
    pub fn spawn(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
