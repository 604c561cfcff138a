//! Open-Meteo forecast client.

use async_trait::async_trait;
use reqwest::Client;
use tracing::instrument;

use frostwatch_core::{ForecastConfig, ForecastError, ReqwestErrorExt};

use crate::types::{HourlyForecast, OpenMeteoResponse};

const FORECAST_PATH: &str = "/v1/forecast";

/// Read-only source of hourly temperature forecasts.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Hourly Celsius series for the given coordinates, in chronological
    /// order, covering the configured horizon.
    ///
    /// # Errors
    /// `ForecastError::Unavailable`/`Network` when the source cannot be
    /// reached or answers with a non-success status;
    /// `ForecastError::MalformedResponse` when the body cannot be decoded.
    async fn hourly(&self, latitude: &str, longitude: &str)
        -> Result<HourlyForecast, ForecastError>;
}

#[derive(Debug, Clone)]
pub struct OpenMeteoProvider {
    client: Client,
    base_url: String,
    forecast_days: u8,
}

impl OpenMeteoProvider {
    /// Build a client from configuration. The request timeout comes from
    /// `forecast.timeout_secs`.
    ///
    /// # Errors
    /// Returns `ForecastError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ForecastConfig) -> Result<Self, ForecastError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            forecast_days: config.forecast_days,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoProvider {
    #[instrument(skip(self), level = "debug")]
    async fn hourly(
        &self,
        latitude: &str,
        longitude: &str,
    ) -> Result<HourlyForecast, ForecastError> {
        let url = format!("{}{}", self.base_url, FORECAST_PATH);
        let forecast_days = self.forecast_days.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", latitude),
                ("longitude", longitude),
                ("hourly", "temperature_2m"),
                ("forecast_days", forecast_days.as_str()),
            ])
            .send()
            .await
            .map_err(|e| e.into_forecast_error())?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ForecastError::Unavailable(format!("{}: {}", status, text)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| e.into_forecast_error())?;
        let parsed: OpenMeteoResponse = serde_json::from_str(&body)
            .map_err(|e| ForecastError::MalformedResponse(format!("JSON parse error: {}", e)))?;

        let forecast = HourlyForecast::try_from(parsed)?;
        tracing::debug!("Fetched {} hourly samples", forecast.len());
        Ok(forecast)
    }
}
