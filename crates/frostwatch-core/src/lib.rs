pub mod config;
pub mod error;
pub mod location;

pub use config::{
    Config, DedupPolicy, ForecastConfig, LegacyConfig, LoggingConfig, MirrorBackend, MirrorConfig,
    NotifyConfig, ServerConfig, SweepConfig, ValidationResult,
};
pub use error::{
    AppError, ConfigError, DirectoryError, ForecastError, MirrorError, NotifyError,
    ReqwestErrorExt, RusqliteErrorExt,
};
pub use location::{CoordinateKey, DeviceToken, Location, TemperatureUnit};

use anyhow::Result;

/// Initialize tracing/logging.
///
/// `RUST_LOG` takes precedence; `default_level` applies when it is unset.
pub fn init_logging(default_level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("Frostwatch logging initialized");
    Ok(())
}
