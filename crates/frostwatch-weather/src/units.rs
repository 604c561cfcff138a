//! Temperature unit conversion for message text.
//!
//! Frost comparisons always happen in Celsius; conversion only affects what
//! the user reads.

use frostwatch_core::TemperatureUnit;

pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Render a Celsius reading in `unit`.
///
/// Celsius keeps its shortest decimal form (`2`, `2.5`); Fahrenheit is
/// rounded to the nearest whole degree.
pub fn display_temperature(celsius: f64, unit: TemperatureUnit) -> String {
    match unit {
        TemperatureUnit::Celsius => format!("{}", celsius),
        TemperatureUnit::Fahrenheit => {
            format!("{}", celsius_to_fahrenheit(celsius).round() as i64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fahrenheit_conversion() {
        assert_eq!(celsius_to_fahrenheit(0.0), 32.0);
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
    }

    #[test]
    fn test_fahrenheit_display_rounds() {
        // 35.6 rounds up
        assert_eq!(display_temperature(2.0, TemperatureUnit::Fahrenheit), "36");
        assert_eq!(display_temperature(-1.0, TemperatureUnit::Fahrenheit), "30");
        assert_eq!(display_temperature(-17.8, TemperatureUnit::Fahrenheit), "0");
    }

    #[test]
    fn test_celsius_display_is_shortest() {
        assert_eq!(display_temperature(2.0, TemperatureUnit::Celsius), "2");
        assert_eq!(display_temperature(2.5, TemperatureUnit::Celsius), "2.5");
        assert_eq!(display_temperature(-0.3, TemperatureUnit::Celsius), "-0.3");
    }
}
