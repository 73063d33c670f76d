//! Per-device availability types.

use serde::{Deserialize, Serialize};

/// Device availability status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    /// Last cycle succeeded.
    Online,
    /// Last cycle failed.
    Offline,
    /// Device status is unknown (never polled).
    #[default]
    Unknown,
}

impl DeviceStatus {
    /// MQTT availability payload, if the status is known.
    pub fn availability_payload(&self) -> Option<&'static str> {
        match self {
            DeviceStatus::Online => Some("online"),
            DeviceStatus::Offline => Some("offline"),
            DeviceStatus::Unknown => None,
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Liveness bookkeeping for one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceHealth {
    /// Current status.
    pub status: DeviceStatus,
    /// Last successful cycle (millis since epoch), 0 if never.
    pub last_seen: i64,
    /// Consecutive failed cycles.
    pub consecutive_failures: u32,
    /// Last error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl DeviceHealth {
    /// Record a successful cycle. Returns true if the status changed.
    pub fn record_success(&mut self, timestamp: i64) -> bool {
        let changed = self.status != DeviceStatus::Online;
        self.status = DeviceStatus::Online;
        self.last_seen = timestamp;
        self.consecutive_failures = 0;
        self.last_error = None;
        changed
    }

    /// Record a failed cycle. Returns true if the status changed.
    pub fn record_failure(&mut self, error: impl Into<String>) -> bool {
        let changed = self.status != DeviceStatus::Offline;
        self.status = DeviceStatus::Offline;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_error = Some(error.into());
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let mut health = DeviceHealth::default();
        assert_eq!(health.status, DeviceStatus::Unknown);

        assert!(health.record_failure("timeout"));
        assert!(!health.record_failure("timeout"));
        assert_eq!(health.consecutive_failures, 2);

        assert!(health.record_success(1_700_000_000_000));
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_error.is_none());
        assert!(!health.record_success(1_700_000_005_000));
    }

    #[test]
    fn test_availability_payload() {
        assert_eq!(DeviceStatus::Online.availability_payload(), Some("online"));
        assert_eq!(DeviceStatus::Unknown.availability_payload(), None);
    }
}
