//! In-process events raised by the server and consumed by the hub.

pub mod bus;

pub use bus::{EventBus, Subscription};

use uuid::Uuid;

use crate::domain::{DeviceStatusReport, PairedDevice};
use crate::protocol::ControlCommand;

/// Events raised by the device registry.
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// A device was registered for the first time.
    DevicePaired(PairedDevice),
}

/// Events raised by the tablet protocol service.
///
/// Events from one connection are published in the order their frames were
/// read off the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    StatusUpdate(DeviceStatusReport),
    HandRaised { device_id: Uuid },
    /// Newly assigned material was not fetched before the deadline.
    DistributionTimedOut { device_id: Uuid },
    /// A lock, unlock or config refresh was not confirmed in time.
    ControlCommandTimedOut {
        device_id: Uuid,
        command: ControlCommand,
    },
    /// The device's connection closed, or went silent past the heartbeat
    /// timeout.  The device stays paired.
    Disconnected { device_id: Uuid },
}

impl ProtocolEvent {
    pub fn device_id(&self) -> Uuid {
        match self {
            ProtocolEvent::StatusUpdate(report) => report.device_id,
            ProtocolEvent::HandRaised { device_id }
            | ProtocolEvent::DistributionTimedOut { device_id }
            | ProtocolEvent::ControlCommandTimedOut { device_id, .. }
            | ProtocolEvent::Disconnected { device_id } => *device_id,
        }
    }
}
