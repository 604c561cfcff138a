//! Per-sweep visit set.
//!
//! Every coordinate key is fetched at most once per sweep. What happens to
//! the other (token, location) pairs at an already-visited key depends on the
//! [`DedupPolicy`].

use std::collections::HashMap;

use frostwatch_core::{CoordinateKey, DedupPolicy};
use frostwatch_weather::FrostReading;

/// What the sweep should do with one (token, location) pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// First visit of this coordinate: fetch and evaluate.
    Evaluate,
    /// Already visited: no fetch, no notification.
    Skip,
    /// Already evaluated under `FanOut`: reuse the outcome for this owner.
    Reuse(Option<FrostReading>),
}

#[derive(Debug, Clone)]
enum Visit {
    Pending,
    Evaluated(Option<FrostReading>),
    Failed,
}

/// Visit set for a single sweep. Dropped when the sweep ends.
#[derive(Debug)]
pub struct DispatchGate {
    policy: DedupPolicy,
    visits: HashMap<CoordinateKey, Visit>,
}

impl DispatchGate {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            visits: HashMap::new(),
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Decide what to do with a pair at `key`, marking the key visited.
    pub fn admit(&mut self, key: &CoordinateKey) -> Admission {
        let Some(visit) = self.visits.get(key) else {
            self.visits.insert(key.clone(), Visit::Pending);
            return Admission::Evaluate;
        };

        match (self.policy, visit) {
            (DedupPolicy::FanOut, Visit::Evaluated(reading)) => Admission::Reuse(*reading),
            _ => Admission::Skip,
        }
    }

    /// Record the evaluation outcome for `key`.
    pub fn record_reading(&mut self, key: &CoordinateKey, reading: Option<FrostReading>) {
        self.visits.insert(key.clone(), Visit::Evaluated(reading));
    }

    /// Record that evaluating `key` failed. Later pairs at the key are skipped.
    pub fn record_failure(&mut self, key: &CoordinateKey) {
        self.visits.insert(key.clone(), Visit::Failed);
    }

    /// Number of distinct coordinates visited so far.
    pub fn visited(&self) -> usize {
        self.visits.len()
    }

    pub fn is_visited(&self, key: &CoordinateKey) -> bool {
        self.visits.contains_key(key)
    }
}
