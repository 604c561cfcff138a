//! Forecast access and frost evaluation for frostwatch.
//!
//! Hourly temperature series come from Open-Meteo; the evaluator scans a
//! series for the first sample below the frost threshold.

pub mod frost;
pub mod provider;
pub mod types;
pub mod units;

pub use frost::{FrostEvaluator, FrostReading, DEFAULT_FROST_THRESHOLD_CELSIUS};
pub use provider::{ForecastSource, OpenMeteoProvider};
pub use types::{ForecastSample, HourlyForecast};
pub use units::{celsius_to_fahrenheit, display_temperature};
