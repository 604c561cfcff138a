use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "FROSTWATCH_CONFIG";

/// Longest accepted sweep interval (one year).
pub const MAX_INTERVAL_HOURS: u64 = 24 * 365;

/// One problem found by [`Config::validate`], keyed by its TOML path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors block startup; warnings are logged.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigIssue>,
    pub warnings: Vec<ConfigIssue>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    fn warn(&mut self, field: &'static str, message: impl Into<String>) {
        self.warnings.push(ConfigIssue {
            field,
            message: message.into(),
        });
    }

    /// `"<n> error(s): field: message; ..."`, or an empty string when valid.
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        let details: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        format!("{} error(s): {}", self.errors.len(), details.join("; "))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Durable store backing the in-memory directory
    #[serde(default)]
    pub mirror: MirrorConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub sweep: SweepConfig,

    #[serde(default)]
    pub notify: NotifyConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub legacy: LegacyConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the mutation API listens on
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "0.0.0.0:5050".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MirrorBackend {
    #[default]
    Sqlite,
    /// Process-local only; nothing survives a restart
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default)]
    pub backend: MirrorBackend,

    /// SQLite database path (sqlite backend only)
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Startup load attempts before giving up
    #[serde(default = "default_load_attempts")]
    pub load_attempts: u32,

    /// Fixed delay between startup load attempts
    #[serde(default = "default_load_retry_delay_secs")]
    pub load_retry_delay_secs: u64,

    /// Upper bound for a single load or save
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("frostwatch").join("locations.db"))
        .unwrap_or_else(|| PathBuf::from("frostwatch.db"))
}

fn default_load_attempts() -> u32 {
    3
}

fn default_load_retry_delay_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            backend: MirrorBackend::default(),
            db_path: default_db_path(),
            load_attempts: default_load_attempts(),
            load_retry_delay_secs: default_load_retry_delay_secs(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl MirrorConfig {
    pub fn load_retry_delay(&self) -> Duration {
        Duration::from_secs(self.load_retry_delay_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Open-Meteo compatible API root
    #[serde(default = "default_forecast_url")]
    pub base_url: String,

    /// Forecast horizon in days
    #[serde(default = "default_forecast_days")]
    pub forecast_days: u8,

    /// Samples strictly below this value (°C) raise an alert
    #[serde(default = "default_frost_threshold")]
    pub frost_threshold_celsius: f64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_forecast_url() -> String {
    "https://api.open-meteo.com".to_string()
}

fn default_forecast_days() -> u8 {
    3
}

fn default_frost_threshold() -> f64 {
    3.0
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            base_url: default_forecast_url(),
            forecast_days: default_forecast_days(),
            frost_threshold_celsius: default_frost_threshold(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ForecastConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How a sweep treats several (token, location) pairs sharing one coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DedupPolicy {
    /// Only the first pair in iteration order is evaluated and notified;
    /// the rest are skipped for that sweep.
    #[default]
    FirstOwner,
    /// The coordinate is evaluated once and every pair is notified.
    FanOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    #[serde(default)]
    pub dedup: DedupPolicy,
}

fn default_interval_hours() -> u64 {
    12
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            dedup: DedupPolicy::default(),
        }
    }
}

impl SweepConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.saturating_mul(3600))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Push gateway endpoint; notifications are only logged when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,

    /// Bearer token sent to the gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            gateway_url: None,
            auth_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl NotifyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegacyConfig {
    /// Token file from the pre-mirror deployment, imported at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_file: Option<PathBuf>,
}

impl Config {
    /// Resolve the config source: explicit path, then `FROSTWATCH_CONFIG`,
    /// then the per-user default (created with defaults if missing).
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::load_from(Path::new(&path));
        }
        Self::load()
    }

    /// Load configuration from the default file, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default configuration to {}", config_path.display());
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            result.error(
                "server.bind",
                format!("Not a socket address: {}", self.server.bind),
            );
        }

        if self.mirror.load_attempts == 0 {
            result.error("mirror.load_attempts", "At least one load attempt is required");
        }
        if self.mirror.timeout_secs == 0 {
            result.error("mirror.timeout_secs", "Timeout must be greater than 0");
        }

        self.validate_url(&self.forecast.base_url, "forecast.base_url", &mut result);
        if self.forecast.forecast_days == 0 || self.forecast.forecast_days > 16 {
            result.error("forecast.forecast_days", "Forecast horizon must be 1-16 days");
        }
        if !self.forecast.frost_threshold_celsius.is_finite() {
            result.error("forecast.frost_threshold_celsius", "Threshold must be finite");
        } else if self.forecast.frost_threshold_celsius > 10.0 {
            result.warn(
                "forecast.frost_threshold_celsius",
                "Threshold above 10°C will alert on most nights",
            );
        }
        if self.forecast.timeout_secs == 0 {
            result.error("forecast.timeout_secs", "Timeout must be greater than 0");
        }

        if self.sweep.interval_hours == 0 {
            result.error("sweep.interval_hours", "Sweep interval must be at least 1 hour");
        } else if self.sweep.interval_hours > MAX_INTERVAL_HOURS {
            result.error(
                "sweep.interval_hours",
                format!("Sweep interval must be at most {} hours", MAX_INTERVAL_HOURS),
            );
        } else if self.sweep.interval_hours > 72 {
            result.warn(
                "sweep.interval_hours",
                "Sweep interval exceeds the forecast horizon",
            );
        }

        match &self.notify.gateway_url {
            Some(url) => self.validate_url(url, "notify.gateway_url", &mut result),
            None => result.warn(
                "notify.gateway_url",
                "No push gateway configured - alerts will only be logged",
            ),
        }

        if let Some(path) = &self.legacy.tokens_file {
            if !path.exists() {
                result.warn(
                    "legacy.tokens_file",
                    format!("Path does not exist: {}", path.display()),
                );
            }
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &'static str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to a file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("frostwatch");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
        // No gateway by default
        assert!(result.warnings.iter().any(|w| w.field == "notify.gateway_url"));
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.server.bind, "0.0.0.0:5050");
        assert_eq!(config.mirror.load_attempts, 3);
        assert_eq!(config.mirror.load_retry_delay(), Duration::from_secs(5));
        assert_eq!(config.forecast.forecast_days, 3);
        assert_eq!(config.forecast.frost_threshold_celsius, 3.0);
        assert_eq!(config.sweep.interval(), Duration::from_secs(12 * 3600));
        assert_eq!(config.sweep.dedup, DedupPolicy::FirstOwner);
    }

    #[test]
    fn test_invalid_forecast_url() {
        let mut config = Config::default();
        config.forecast.base_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "forecast.base_url"));
    }

    #[test]
    fn test_gateway_must_be_http() {
        let mut config = Config::default();
        config.notify.gateway_url = Some("ftp://push.example.com".to_string());
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "notify.gateway_url"));
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = Config::default();
        config.mirror.load_attempts = 0;
        config.sweep.interval_hours = 0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "mirror.load_attempts"));
        assert!(result.errors.iter().any(|e| e.field == "sweep.interval_hours"));
        assert!(result.error_summary().starts_with("2 error(s): "));
        assert!(result.error_summary().contains("mirror.load_attempts"));
    }

    #[test]
    fn test_interval_upper_bound() {
        let config: Config = toml::from_str("[sweep]\ninterval_hours = 10000000000000000").unwrap();
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "sweep.interval_hours"));
        // Out-of-range values saturate instead of overflowing
        assert_eq!(config.sweep.interval(), Duration::from_secs(u64::MAX));

        let mut config = Config::default();
        config.sweep.interval_hours = MAX_INTERVAL_HOURS;
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "sweep.interval_hours"));
    }

    #[test]
    fn test_bad_bind_address() {
        let mut config = Config::default();
        config.server.bind = "localhost".to_string();
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [sweep]
            dedup = "fan_out"

            [mirror]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.sweep.dedup, DedupPolicy::FanOut);
        assert_eq!(config.sweep.interval_hours, 12);
        assert_eq!(config.mirror.backend, MirrorBackend::Memory);
        assert_eq!(config.mirror.timeout_secs, 10);
        assert_eq!(config.server.bind, "0.0.0.0:5050");
    }

    #[test]
    fn test_save_and_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.notify.gateway_url = Some("https://push.example.com/send".to_string());
        config.sweep.interval_hours = 6;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.sweep.interval_hours, 6);
        assert_eq!(
            loaded.notify.gateway_url.as_deref(),
            Some("https://push.example.com/send")
        );
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("not found"), "{}", err);
    }

    #[test]
    fn test_load_from_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[sweep\ninterval_hours = ").unwrap();
        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("parse"), "{}", err);
    }
}
