//! Paired tablets and the live status they report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tablet that has completed pairing.
///
/// Created on the first successful registration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairedDevice {
    pub device_id: Uuid,
    pub paired_at: DateTime<Utc>,
}

impl PairedDevice {
    /// Creates a record for `device_id` stamped with the current time.
    pub fn new(device_id: Uuid) -> Self {
        Self {
            device_id,
            paired_at: Utc::now(),
        }
    }
}

/// What the student is currently doing, as reported by the tablet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    /// The student is looking at the distributed material.
    OnTask,
    /// The tablet is awake but the student has not interacted recently.
    Idle,
    /// The teacher has locked the screen.
    Locked,
    /// The tablet is no longer connected.
    Disconnected,
}

/// A single live status report.
///
/// This is the JSON payload of a `STATUS_UPDATE` frame and, unchanged, the
/// payload of the `UpdateDeviceStatus` push message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatusReport {
    pub device_id: Uuid,
    pub status: DeviceStatus,
    /// Battery charge in percent, when the tablet knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_material_id: Option<Uuid>,
    /// Identifier of the screen the student is on (page, question, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_view: Option<String>,
    /// Unix time in milliseconds, taken on the tablet.
    pub timestamp: i64,
}

impl DeviceStatusReport {
    /// Builds the synthetic report published when a tablet's connection drops.
    pub fn disconnected(device_id: Uuid) -> Self {
        Self {
            device_id,
            status: DeviceStatus::Disconnected,
            battery_level: None,
            current_material_id: None,
            student_view: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_status_serializes_in_screaming_snake_case() {
        let json = serde_json::to_string(&DeviceStatus::OnTask).unwrap();
        assert_eq!(json, "\"ON_TASK\"");
    }

    #[test]
    fn test_status_report_parses_tablet_json_without_optional_fields() {
        // Arrange
        let id = Uuid::new_v4();
        let json = format!(r#"{{"deviceId":"{id}","status":"IDLE","timestamp":1700000000000}}"#);

        // Act
        let report: DeviceStatusReport = serde_json::from_str(&json).unwrap();

        // Assert
        assert_eq!(report.device_id, id);
        assert_eq!(report.status, DeviceStatus::Idle);
        assert_eq!(report.battery_level, None);
        assert_eq!(report.student_view, None);
    }

    #[test]
    fn test_disconnected_report_carries_disconnected_status() {
        let id = Uuid::new_v4();
        let report = DeviceStatusReport::disconnected(id);
        assert_eq!(report.device_id, id);
        assert_eq!(report.status, DeviceStatus::Disconnected);
    }
}
