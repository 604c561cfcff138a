//! Frost evaluation.
//!
//! A location is frosty when any hourly sample in the forecast horizon is
//! strictly below the threshold (in Celsius). Only the first such sample is
//! reported.

use chrono::NaiveDateTime;

use frostwatch_core::{ForecastError, Location, TemperatureUnit};

use crate::provider::ForecastSource;
use crate::types::HourlyForecast;
use crate::units::display_temperature;

pub const DEFAULT_FROST_THRESHOLD_CELSIUS: f64 = 3.0;

/// Date format used in alert text, e.g. "January 2".
pub const ALERT_DATE_FORMAT: &str = "%B %-d";

/// The first sub-threshold sample of a forecast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrostReading {
    pub time: NaiveDateTime,
    pub temperature_celsius: f64,
}

impl FrostReading {
    /// Temperature rendered in the location's unit.
    pub fn display_value(&self, unit: TemperatureUnit) -> String {
        display_temperature(self.temperature_celsius, unit)
    }

    /// Date rendered for alert text.
    pub fn display_time(&self) -> String {
        self.time.format(ALERT_DATE_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FrostEvaluator {
    threshold_celsius: f64,
}

impl Default for FrostEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_FROST_THRESHOLD_CELSIUS)
    }
}

impl FrostEvaluator {
    pub fn new(threshold_celsius: f64) -> Self {
        Self { threshold_celsius }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold_celsius
    }

    /// First sample strictly below the threshold, in chronological order.
    pub fn evaluate(&self, forecast: &HourlyForecast) -> Option<FrostReading> {
        forecast
            .samples
            .iter()
            .find(|sample| sample.temperature_celsius < self.threshold_celsius)
            .map(|sample| FrostReading {
                time: sample.time,
                temperature_celsius: sample.temperature_celsius,
            })
    }

    /// Fetch the forecast for `location` and evaluate it.
    ///
    /// # Errors
    /// Propagates the source's `ForecastError`; callers in a sweep log it and
    /// move on.
    pub async fn check(
        &self,
        source: &dyn ForecastSource,
        location: &Location,
    ) -> Result<Option<FrostReading>, ForecastError> {
        let forecast = source
            .hourly(&location.latitude, &location.longitude)
            .await?;

        let reading = self.evaluate(&forecast);
        match &reading {
            Some(r) => tracing::debug!(
                "Frost at {} ({}): {}°C at {}",
                location.coordinate_key(),
                location.name,
                r.temperature_celsius,
                r.time
            ),
            None => tracing::debug!(
                "No frost at {} across {} samples",
                location.coordinate_key(),
                forecast.len()
            ),
        }
        Ok(reading)
    }
}
