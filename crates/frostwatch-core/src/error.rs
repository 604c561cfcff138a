//! Centralized error types for frostwatch.
//!
//! Each boundary (directory, mirror, forecast source, notifier, config) has
//! its own enum; `AppError` aggregates them for the HTTP layer and the
//! binary. Benign mutation outcomes (already exists, not found) are not
//! errors and live beside the directory as plain enums.

use thiserror::Error;

/// Top-level application error type.
///
/// Use `user_message()` to get a message suitable for an HTTP response body.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("Mirror error: {0}")]
    Mirror(#[from] MirrorError),

    #[error("Forecast error: {0}")]
    Forecast(#[from] ForecastError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a client-facing message that does not leak backend details.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Directory(e) => e.user_message(),
            AppError::Mirror(_) => "The location store is unavailable. Please try again.",
            AppError::Forecast(e) => e.user_message(),
            AppError::Notify(_) => "Notification delivery failed.",
            AppError::Config(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }
}

/// Errors surfaced by directory mutations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("Unknown token: {0}")]
    UnknownToken(String),

    /// The mirror write (or startup load) failed. For mutations the
    /// in-memory change has already been applied.
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),
}

impl DirectoryError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DirectoryError::UnknownToken(_) => "This device is not registered.",
            DirectoryError::RemoteUnavailable(_) => {
                "The location store is unavailable. Please try again."
            }
        }
    }

    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, DirectoryError::RemoteUnavailable(_))
    }
}

impl From<MirrorError> for DirectoryError {
    fn from(err: MirrorError) -> Self {
        DirectoryError::RemoteUnavailable(err.to_string())
    }
}

/// Errors reported by a remote mirror implementation.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Mirror unavailable: {0}")]
    Unavailable(String),

    #[error("Mirror record corrupt: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MirrorError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt(message.into())
    }
}

/// Forecast source errors. Never fatal to a sweep.
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("Forecast unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed forecast response: {0}")]
    MalformedResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ForecastError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ForecastError::Unavailable(_) | ForecastError::Network(_) => {
                "Weather service unavailable. Please try again later."
            }
            ForecastError::MalformedResponse(_) => "Weather service returned unexpected data.",
        }
    }
}

/// Push delivery errors. Logged, never retried.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Push gateway rejected notification: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Configuration parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Parse(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
        }
    }
}

/// Extension trait for classifying reqwest errors from the forecast source.
pub trait ReqwestErrorExt {
    fn into_forecast_error(self) -> ForecastError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_forecast_error(self) -> ForecastError {
        if self.is_decode() {
            ForecastError::MalformedResponse(self.to_string())
        } else if self.is_timeout() {
            ForecastError::Unavailable(format!("request timed out: {}", self))
        } else {
            ForecastError::Network(self)
        }
    }
}

/// Extension trait for converting rusqlite errors to mirror errors.
pub trait RusqliteErrorExt {
    fn into_mirror_error(self) -> MirrorError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_mirror_error(self) -> MirrorError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                MirrorError::Corrupt(self.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..) => MirrorError::Corrupt(self.to_string()),
            _ => MirrorError::Unavailable(self.to_string()),
        }
    }
}
