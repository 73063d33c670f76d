//! Home Assistant MQTT discovery payloads.
//!
//! These structures match the JSON schema Home Assistant expects on
//! `<prefix>/sensor/<object_id>/config`.

use serde::{Deserialize, Serialize};

/// Device block shared by every sensor of one physical device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,
}

/// Discovery config for one sensor entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDiscovery {
    pub name: String,
    pub unique_id: String,
    pub object_id: String,
    pub state_topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_topic: Option<String>,
    pub device: DeviceInfo,
}

impl SensorDiscovery {
    /// Fill `unit_of_measurement`, `device_class` and `state_class` from
    /// the reading's unit and name.
    pub fn with_unit(mut self, name: &str, unit: &str) -> Self {
        let unit = unit.trim();
        self.unit_of_measurement = (!unit.is_empty()).then(|| unit.to_string());
        self.device_class = guess_device_class(name, unit).map(str::to_string);
        self.state_class = guess_state_class(unit).map(str::to_string);
        self
    }
}

/// Map a unit (and, for `%`, the reading name) to a Home Assistant device class.
pub fn guess_device_class(name: &str, unit: &str) -> Option<&'static str> {
    match unit.trim() {
        "°C" => Some("temperature"),
        "bar" | "Pa" | "kPa" | "hPa" | "psi" | "mmHg" | "inHg" => Some("pressure"),
        "A" => Some("current"),
        "%" if name.to_lowercase().contains("humidity") => Some("humidity"),
        _ => None,
    }
}

/// Map a unit to a Home Assistant state class.
pub fn guess_state_class(unit: &str) -> Option<&'static str> {
    match unit.trim() {
        "°C" | "bar" | "A" | "%" | "rpm" => Some("measurement"),
        "h" | "m3" | "count" => Some("total_increasing"),
        _ => None,
    }
}
