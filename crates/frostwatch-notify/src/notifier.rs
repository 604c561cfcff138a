//! Notifier boundary.

use async_trait::async_trait;
use std::sync::Arc;

use frostwatch_core::{NotifyConfig, NotifyError};

use crate::message::FrostNotification;
use crate::webhook::WebhookNotifier;

/// Write-only push collaborator.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Hand `notification` off for delivery.
    ///
    /// # Errors
    /// Returns `NotifyError` when the gateway refuses or cannot be reached.
    async fn notify(&self, notification: &FrostNotification) -> Result<(), NotifyError>;
}

/// Notifier that only logs. Used when no gateway is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn notify(&self, notification: &FrostNotification) -> Result<(), NotifyError> {
        tracing::info!(
            token = %notification.token,
            "{}",
            notification.message()
        );
        Ok(())
    }
}

/// Pick the notifier for `config`: the webhook when a gateway URL is set,
/// otherwise the log-only notifier.
///
/// # Errors
/// Returns `NotifyError::Network` if the HTTP client cannot be built.
pub fn build_notifier(config: &NotifyConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
    match &config.gateway_url {
        Some(url) => {
            tracing::info!("Notifications go to push gateway at {}", url);
            Ok(Arc::new(WebhookNotifier::new(
                url,
                config.auth_token.clone(),
                config.timeout(),
            )?))
        }
        None => {
            tracing::info!("No push gateway configured; notifications are logged only");
            Ok(Arc::new(LogNotifier))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use frostwatch_core::{DeviceToken, TemperatureUnit};

    #[tokio::test]
    async fn test_log_notifier_accepts() {
        let notification = FrostNotification {
            version: 1,
            token: DeviceToken::new("t"),
            location_name: "Orchard".to_string(),
            time: "January 2".to_string(),
            value: "2".to_string(),
            unit: TemperatureUnit::Celsius,
        };
        assert!(LogNotifier.notify(&notification).await.is_ok());
    }

    #[test]
    fn test_build_defaults_to_log() {
        let notifier = build_notifier(&NotifyConfig::default()).unwrap();
        assert_eq!(notifier.name(), "log");
    }

    #[test]
    fn test_build_webhook_when_configured() {
        let config = NotifyConfig {
            gateway_url: Some("http://localhost:9999/push".to_string()),
            ..NotifyConfig::default()
        };
        let notifier = build_notifier(&config).unwrap();
        assert_eq!(notifier.name(), "webhook");
    }
}
