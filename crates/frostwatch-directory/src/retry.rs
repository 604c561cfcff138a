//! Bounded retry for the startup load.
//!
//! The mirror is retried a fixed number of times with a fixed delay. There
//! is no backoff: startup either gets the directory within a few seconds or
//! the process exits.

use std::sync::Arc;
use std::time::Duration;

use frostwatch_core::{DirectoryError, MirrorConfig};

use crate::directory::Directory;
use crate::mirror::RemoteMirror;

pub const DEFAULT_LOAD_ATTEMPTS: u32 = 3;
pub const DEFAULT_LOAD_DELAY_SECS: u64 = 5;

/// Startup retry configuration.
#[derive(Debug, Clone)]
pub struct StartupRetry {
    /// Total load attempts, the first one included.
    pub attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for StartupRetry {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_LOAD_ATTEMPTS,
            delay: Duration::from_secs(DEFAULT_LOAD_DELAY_SECS),
        }
    }
}

impl StartupRetry {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn from_config(config: &MirrorConfig) -> Self {
        Self::new(config.load_attempts, config.load_retry_delay())
    }
}

/// Load the directory, retrying up to `retry.attempts` times.
///
/// # Errors
/// Returns the last `DirectoryError::RemoteUnavailable` once every attempt
/// has failed.
pub async fn load_with_retry(
    mirror: Arc<dyn RemoteMirror>,
    mirror_timeout: Duration,
    retry: &StartupRetry,
) -> Result<Directory, DirectoryError> {
    let attempts = retry.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            tracing::info!(
                "Retrying {} load in {:?} (attempt {} of {})",
                mirror.name(),
                retry.delay,
                attempt,
                attempts
            );
            tokio::time::sleep(retry.delay).await;
        }

        match Directory::load(Arc::clone(&mirror), mirror_timeout).await {
            Ok(directory) => {
                if attempt > 1 {
                    tracing::info!("Directory loaded after {} attempts", attempt);
                }
                return Ok(directory);
            }
            Err(e) => {
                tracing::warn!(
                    "Directory load attempt {} of {} failed: {}",
                    attempt,
                    attempts,
                    e
                );
                last_error = Some(e);
            }
        }
    }

    tracing::error!("All {} directory load attempts exhausted", attempts);
    Err(last_error.unwrap_or_else(|| {
        DirectoryError::RemoteUnavailable(format!("{} load never attempted", mirror.name()))
    }))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::memory::MemoryMirror;
    use frostwatch_core::{DeviceToken, Location, TemperatureUnit};

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn fast(attempts: u32) -> StartupRetry {
        StartupRetry::new(attempts, Duration::from_millis(5))
    }

    #[test]
    fn test_default_retry() {
        let retry = StartupRetry::default();
        assert_eq!(retry.attempts, 3);
        assert_eq!(retry.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_from_config() {
        let config = MirrorConfig::default();
        let retry = StartupRetry::from_config(&config);
        assert_eq!(retry.attempts, config.load_attempts);
        assert_eq!(retry.delay, config.load_retry_delay());
    }

    #[tokio::test]
    async fn test_first_attempt_succeeds() {
        let mirror = Arc::new(MemoryMirror::new());
        let dir = load_with_retry(mirror.clone(), TIMEOUT, &fast(3)).await.unwrap();
        assert!(dir.is_empty());
        assert_eq!(mirror.load_count(), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_last_attempt() {
        let mut entries = crate::mirror::Entries::new();
        entries.insert(
            DeviceToken::new("a"),
            vec![Location::new("1", "2", "x", TemperatureUnit::Celsius)],
        );
        let mirror = Arc::new(MemoryMirror::with_entries(entries));
        mirror.fail_next_loads(2);

        let dir = load_with_retry(mirror.clone(), TIMEOUT, &fast(3)).await.unwrap();

        assert_eq!(dir.len(), 1);
        assert_eq!(mirror.load_count(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_remote_unavailable() {
        let mirror = Arc::new(MemoryMirror::new());
        mirror.fail_next_loads(10);

        let result = load_with_retry(mirror.clone(), TIMEOUT, &fast(3)).await;

        assert!(matches!(result, Err(DirectoryError::RemoteUnavailable(_))));
        assert_eq!(mirror.load_count(), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let mirror = Arc::new(MemoryMirror::new());
        load_with_retry(mirror.clone(), TIMEOUT, &fast(0)).await.unwrap();
        assert_eq!(mirror.load_count(), 1);
    }
}
