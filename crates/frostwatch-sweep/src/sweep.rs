//! One pass over the directory.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use frostwatch_core::{DedupPolicy, DeviceToken, ForecastError, Location};
use frostwatch_directory::Directory;
use frostwatch_notify::{FrostNotification, Notifier};
use frostwatch_weather::{FrostEvaluator, FrostReading, ForecastSource};

use crate::gate::{Admission, DispatchGate};

const DEFAULT_FORECAST_TIMEOUT: Duration = Duration::from_secs(10);

/// Counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Tokens in the snapshot.
    pub tokens: usize,
    /// (token, location) pairs considered.
    pub visited: usize,
    /// Pairs dropped by the gate (no fetch, no notification).
    pub skipped: usize,
    /// Forecast fetches.
    pub evaluated: usize,
    /// Notifications handed to the notifier and accepted.
    pub alerts: usize,
    /// Failed fetches plus rejected notifications.
    pub failures: usize,
}

impl std::fmt::Display for SweepReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Sweep complete: {} tokens, {} pairs, {} skipped, {} evaluated, {} alerts, {} failures",
            self.tokens, self.visited, self.skipped, self.evaluated, self.alerts, self.failures
        )
    }
}

pub struct Sweeper {
    directory: Arc<Directory>,
    source: Arc<dyn ForecastSource>,
    notifier: Arc<dyn Notifier>,
    evaluator: FrostEvaluator,
    policy: DedupPolicy,
    forecast_timeout: Duration,
}

impl Sweeper {
    pub fn new(
        directory: Arc<Directory>,
        source: Arc<dyn ForecastSource>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            directory,
            source,
            notifier,
            evaluator: FrostEvaluator::default(),
            policy: DedupPolicy::default(),
            forecast_timeout: DEFAULT_FORECAST_TIMEOUT,
        }
    }

    pub fn with_evaluator(mut self, evaluator: FrostEvaluator) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_policy(mut self, policy: DedupPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Upper bound on a single forecast fetch, on top of the source's own
    /// client timeout.
    pub fn with_forecast_timeout(mut self, timeout: Duration) -> Self {
        self.forecast_timeout = timeout;
        self
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Run a full sweep over a snapshot taken now.
    ///
    /// Never fails: forecast and delivery errors are logged and counted.
    pub async fn run_once(&self) -> SweepReport {
        let snapshot = self.directory.snapshot();
        let mut gate = DispatchGate::new(self.policy);
        let mut report = SweepReport {
            tokens: snapshot.len(),
            ..SweepReport::default()
        };

        tracing::info!(
            "Starting sweep over {} tokens ({} locations, {:?})",
            snapshot.len(),
            snapshot.location_count(),
            self.policy
        );

        for (token, locations) in snapshot.iter() {
            for location in locations {
                report.visited += 1;
                let key = location.coordinate_key();

                match gate.admit(&key) {
                    Admission::Skip => {
                        tracing::debug!("Skipping {} for token {}: already visited", key, token);
                        report.skipped += 1;
                    }
                    Admission::Reuse(reading) => {
                        if let Some(reading) = reading {
                            self.dispatch(token, location, &reading, &mut report).await;
                        }
                    }
                    Admission::Evaluate => {
                        report.evaluated += 1;
                        match self.evaluate(location).await {
                            Ok(reading) => {
                                gate.record_reading(&key, reading);
                                if let Some(reading) = reading {
                                    self.dispatch(token, location, &reading, &mut report).await;
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "Forecast for {} ({}) failed, retrying next sweep: {}",
                                    location.name,
                                    key,
                                    e
                                );
                                gate.record_failure(&key);
                                report.failures += 1;
                            }
                        }
                    }
                }
            }
        }

        tracing::info!("{}", report);
        report
    }

    async fn evaluate(&self, location: &Location) -> Result<Option<FrostReading>, ForecastError> {
        match tokio::time::timeout(
            self.forecast_timeout,
            self.evaluator.check(self.source.as_ref(), location),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ForecastError::Unavailable(format!(
                "forecast timed out after {:?}",
                self.forecast_timeout
            ))),
        }
    }

    async fn dispatch(
        &self,
        token: &DeviceToken,
        location: &Location,
        reading: &FrostReading,
        report: &mut SweepReport,
    ) {
        let notification = FrostNotification::for_reading(token, location, reading);

        match self.notifier.notify(&notification).await {
            Ok(()) => {
                tracing::info!("Frost alert sent to {} for {}", token, location.name);
                report.alerts += 1;
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to notify {} ({} notifier): {}",
                    token,
                    self.notifier.name(),
                    e
                );
                report.failures += 1;
            }
        }
    }
}
