//! JSON push messages sent to teacher UI clients.
//!
//! Every message is a JSON object naming the client-side method to invoke and
//! the argument to invoke it with:
//!
//! ```json
//! {"method":"HandRaised","payload":{"deviceId":"6f1c..."}}
//! {"method":"UpdateDeviceStatus","payload":{"deviceId":"6f1c...","status":"IDLE","timestamp":1700000000000}}
//! ```
//!
//! Serde's adjacently tagged representation
//! (`#[serde(tag = "method", content = "payload")]`) produces exactly this
//! shape.  Payload fields are camelCase so the UI can use them directly.

use classroom_core::{ControlCommand, DeviceStatusReport, PairedDevice};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payload for messages that only identify a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdPayload {
    pub device_id: Uuid,
}

/// Payload of `RemoteControlFailed`: which command a device did not confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFailurePayload {
    pub device_id: Uuid,
    pub command: ControlCommand,
}

/// Everything the hub pushes to UI clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "payload")]
pub enum PushMessage {
    /// A tablet paired for the first time.
    DevicePaired(PairedDevice),
    /// A tablet reported its status, or its connection dropped.
    UpdateDeviceStatus(DeviceStatusReport),
    HandRaised(DeviceIdPayload),
    /// Assigned material was not fetched before the deadline.
    DistributionFailed(DeviceIdPayload),
    /// A lock or unlock was not confirmed before the deadline.
    RemoteControlFailed(ControlFailurePayload),
    /// A config refresh was not followed by a config fetch in time.
    ConfigRefreshFailed(DeviceIdPayload),
}

impl PushMessage {
    /// The client-side method name, as it appears in the `method` field.
    pub fn method(&self) -> &'static str {
        match self {
            PushMessage::DevicePaired(_) => "DevicePaired",
            PushMessage::UpdateDeviceStatus(_) => "UpdateDeviceStatus",
            PushMessage::HandRaised(_) => "HandRaised",
            PushMessage::DistributionFailed(_) => "DistributionFailed",
            PushMessage::RemoteControlFailed(_) => "RemoteControlFailed",
            PushMessage::ConfigRefreshFailed(_) => "ConfigRefreshFailed",
        }
    }

    /// The device the message is about.
    pub fn device_id(&self) -> Uuid {
        match self {
            PushMessage::DevicePaired(device) => device.device_id,
            PushMessage::UpdateDeviceStatus(report) => report.device_id,
            PushMessage::HandRaised(p)
            | PushMessage::DistributionFailed(p)
            | PushMessage::ConfigRefreshFailed(p) => p.device_id,
            PushMessage::RemoteControlFailed(p) => p.device_id,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
