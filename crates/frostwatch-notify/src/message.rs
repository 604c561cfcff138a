use serde::{Deserialize, Serialize};

use frostwatch_core::{DeviceToken, Location, TemperatureUnit};
use frostwatch_weather::FrostReading;

/// Version of the notification payload. Bump when a field changes.
pub const NOTIFICATION_VERSION: u32 = 1;

/// A frost alert addressed to one device.
///
/// `time` and `value` are already rendered for display: `time` like
/// "January 2", `value` in the location's unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrostNotification {
    pub version: u32,
    pub token: DeviceToken,
    pub location_name: String,
    pub time: String,
    pub value: String,
    pub unit: TemperatureUnit,
}

impl FrostNotification {
    /// Alert for `token` about `location`, rendered in the location's unit.
    pub fn for_reading(token: &DeviceToken, location: &Location, reading: &FrostReading) -> Self {
        Self {
            version: NOTIFICATION_VERSION,
            token: token.clone(),
            location_name: location.name.clone(),
            time: reading.display_time(),
            value: reading.display_value(location.unit),
            unit: location.unit,
        }
    }

    pub fn title(&self) -> String {
        format!("Frost Alert for {}", self.location_name)
    }

    pub fn body(&self) -> String {
        format!(
            "Temperatures as low as {}°{} expected on {}",
            self.value, self.unit, self.time
        )
    }

    /// Text handed to the push collaborator.
    pub fn message(&self) -> String {
        format!("{}: {}", self.title(), self.body())
    }
}
