//! Push gateway client.
//!
//! POSTs each notification as JSON to a gateway that owns the device-push
//! protocol. The payload carries the structured fields plus the rendered
//! title and body.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

use frostwatch_core::NotifyError;

use crate::message::FrostNotification;
use crate::notifier::Notifier;

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    #[serde(flatten)]
    notification: &'a FrostNotification,
    title: String,
    body: String,
}

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
    auth_token: Option<String>,
}

impl WebhookNotifier {
    /// # Errors
    /// Returns `NotifyError::Network` if the HTTP client cannot be built.
    pub fn new(url: &str, auth_token: Option<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
            auth_token,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip(self, notification), fields(token = %notification.token), level = "debug")]
    async fn notify(&self, notification: &FrostNotification) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            notification,
            title: notification.title(),
            body: notification.body(),
        };

        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            tracing::debug!("Push gateway accepted notification ({})", status);
            Ok(())
        } else {
            let message = response.text().await.unwrap_or_default();
            Err(NotifyError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}
