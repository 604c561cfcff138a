use chrono::NaiveDateTime;
use frostwatch_core::ForecastError;
use serde::{Deserialize, Serialize};

/// Timestamp format of Open-Meteo hourly times (local time, no seconds).
pub const HOURLY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// One hourly forecast point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastSample {
    pub time: NaiveDateTime,
    pub temperature_celsius: f64,
}

/// Hourly temperature series in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HourlyForecast {
    pub samples: Vec<ForecastSample>,
}

impl HourlyForecast {
    pub fn new(samples: Vec<ForecastSample>) -> Self {
        Self { samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Open-Meteo `/v1/forecast` response (only the fields we read).
#[derive(Debug, Deserialize)]
pub(crate) struct OpenMeteoResponse {
    pub hourly: OpenMeteoHourly,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenMeteoHourly {
    pub time: Vec<String>,
    /// Open-Meteo reports missing hours as `null`.
    pub temperature_2m: Vec<Option<f64>>,
}

impl TryFrom<OpenMeteoResponse> for HourlyForecast {
    type Error = ForecastError;

    fn try_from(response: OpenMeteoResponse) -> Result<Self, Self::Error> {
        let hourly = response.hourly;
        if hourly.time.len() != hourly.temperature_2m.len() {
            return Err(ForecastError::MalformedResponse(format!(
                "{} timestamps but {} temperatures",
                hourly.time.len(),
                hourly.temperature_2m.len()
            )));
        }

        let mut samples = Vec::with_capacity(hourly.time.len());
        for (time, temperature) in hourly.time.iter().zip(hourly.temperature_2m) {
            let time = NaiveDateTime::parse_from_str(time, HOURLY_TIME_FORMAT).map_err(|e| {
                ForecastError::MalformedResponse(format!("bad timestamp {:?}: {}", time, e))
            })?;
            if let Some(temperature_celsius) = temperature {
                samples.push(ForecastSample {
                    time,
                    temperature_celsius,
                });
            }
        }

        Ok(Self { samples })
    }
}
