//! Data model shared by the directory, the frost evaluator and the sweep.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a notification-receiving device.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceToken(String);

impl DeviceToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DeviceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceToken {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for DeviceToken {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// Temperature unit preference of a location.
///
/// Serialized as `"C"` / `"F"`; a missing unit means Celsius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C")]
    Celsius,
    #[serde(rename = "F")]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Celsius => "C",
            Self::Fahrenheit => "F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A location of interest registered for a device.
///
/// Equality is structural over all four fields. Coordinates are kept as the
/// decimal strings the client sent, so `"10"` and `"10.0"` are different
/// locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub latitude: String,
    pub longitude: String,
    pub name: String,
    #[serde(default)]
    pub unit: TemperatureUnit,
}

impl Location {
    pub fn new(
        latitude: impl Into<String>,
        longitude: impl Into<String>,
        name: impl Into<String>,
        unit: TemperatureUnit,
    ) -> Self {
        Self {
            latitude: latitude.into(),
            longitude: longitude.into(),
            name: name.into(),
            unit,
        }
    }

    /// Key used to deduplicate forecast lookups within a sweep.
    pub fn coordinate_key(&self) -> CoordinateKey {
        CoordinateKey::new(&self.latitude, &self.longitude)
    }

    pub fn has_coordinates(&self, latitude: &str, longitude: &str) -> bool {
        self.latitude == latitude && self.longitude == longitude
    }

    /// Check that both coordinates are decimal numbers within range.
    pub fn validate_coordinates(latitude: &str, longitude: &str) -> Result<(), String> {
        let lat: f64 = latitude
            .trim()
            .parse()
            .map_err(|_| format!("latitude is not a decimal number: {:?}", latitude))?;
        let lon: f64 = longitude
            .trim()
            .parse()
            .map_err(|_| format!("longitude is not a decimal number: {:?}", longitude))?;

        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!("latitude out of range: {}", latitude));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(format!("longitude out of range: {}", longitude));
        }
        Ok(())
    }
}

/// Coordinate pair key (`latitude|longitude`) visited during a sweep.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CoordinateKey(String);

impl CoordinateKey {
    pub fn new(latitude: &str, longitude: &str) -> Self {
        Self(format!("{}|{}", latitude, longitude))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoordinateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn test_location_equality_is_structural() {
        let a = Location::new("10", "20", "Orchard", TemperatureUnit::Celsius);
        let b = Location::new("10", "20", "Orchard", TemperatureUnit::Celsius);
        let c = Location::new("10", "20", "Orchard", TemperatureUnit::Fahrenheit);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_coordinate_key_ignores_name_and_unit() {
        let a = Location::new("10", "20", "Orchard", TemperatureUnit::Celsius);
        let b = Location::new("10", "20", "Garden", TemperatureUnit::Fahrenheit);
        assert_eq!(a.coordinate_key(), b.coordinate_key());
        assert_eq!(a.coordinate_key().as_str(), "10|20");
    }

    #[test]
    fn test_unit_serializes_as_letter() {
        let loc = Location::new("1.5", "-2.25", "Field", TemperatureUnit::Fahrenheit);
        let json = serde_json::to_string(&loc).unwrap();
        assert!(json.contains("\"unit\":\"F\""), "{}", json);
    }

    #[test]
    fn test_missing_unit_defaults_to_celsius() {
        let loc: Location =
            serde_json::from_str(r#"{"latitude":"1","longitude":"2","name":"x"}"#).unwrap();
        assert_eq!(loc.unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let result: Result<Location, _> = serde_json::from_str(
            r#"{"latitude":"1","longitude":"2","name":"x","unit":"K"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(Location::validate_coordinates("45.5", "-122.6").is_ok());
        assert!(Location::validate_coordinates("north", "0").is_err());
        assert!(Location::validate_coordinates("91", "0").is_err());
        assert!(Location::validate_coordinates("0", "-180.5").is_err());
    }

    #[test]
    fn test_device_token_serializes_transparently() {
        let token = DeviceToken::new("abc123");
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"abc123\"");
        assert!(DeviceToken::new("  ").is_blank());
    }
}
