use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// A single decoded reading, in engineering units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Register id the reading was decoded from (e.g., "3007.05").
    pub register: String,

    /// Human-readable name (e.g., "Running Hours").
    pub name: String,

    /// The decoded value.
    pub value: ReadingValue,

    /// Unit of measurement (e.g., "bar", "°C", "count").
    pub unit: String,
}

impl Reading {
    pub fn new(
        register: impl Into<String>,
        name: impl Into<String>,
        value: ReadingValue,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            register: register.into(),
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// Typed reading value.
///
/// Unscaled registers stay integers so large counters are never rounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    /// Raw integer, no scaling applied.
    Integer(u64),

    /// Scaled floating point value.
    Scaled(f64),
}

impl ReadingValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            ReadingValue::Integer(v) => *v as f64,
            ReadingValue::Scaled(v) => *v,
        }
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Integer(v) => write!(f, "{}", v),
            ReadingValue::Scaled(v) => write!(f, "{}", v),
        }
    }
}

impl From<u64> for ReadingValue {
    fn from(v: u64) -> Self {
        ReadingValue::Integer(v)
    }
}

impl From<f64> for ReadingValue {
    fn from(v: f64) -> Self {
        ReadingValue::Scaled(v)
    }
}

/// Outcome of one poll cycle for one device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollResult {
    /// Configured device name.
    pub device: String,

    /// Unix epoch milliseconds when the cycle started.
    pub timestamp: i64,

    /// Decoded readings, in catalog order. Empty when `error` is set.
    #[serde(default)]
    pub readings: Vec<Reading>,

    /// Raw answer text, if the device answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,

    /// Failure description, if the cycle failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PollResult {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            timestamp: current_timestamp_millis(),
            readings: Vec::new(),
            raw_answer: None,
            error: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Get the current timestamp in milliseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_creation() {
        let reading = Reading::new("3007.01", "Running Hours", 12.5.into(), "h");

        assert_eq!(reading.register, "3007.01");
        assert_eq!(reading.value, ReadingValue::Scaled(12.5));
        assert_eq!(reading.unit, "h");
    }

    #[test]
    fn test_value_display() {
        assert_eq!(ReadingValue::Integer(4_294_967_295).to_string(), "4294967295");
        assert_eq!(ReadingValue::Scaled(7.25).to_string(), "7.25");
        assert_eq!(ReadingValue::Scaled(25.0).to_string(), "25");
    }

    #[test]
    fn test_poll_result_state() {
        let mut result = PollResult::new("compressor");
        assert!(result.is_ok());
        assert!(result.timestamp > 0);

        result.error = Some("timeout".to_string());
        assert!(!result.is_ok());
    }
}
