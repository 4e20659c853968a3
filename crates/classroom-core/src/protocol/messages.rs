//! Message types exchanged with student tablets over TCP.
//!
//! Opcodes below 0x10 are commands the server sends; 0x10 and up are sent by
//! the tablet, except `PAIRING_ACK` which answers `PAIRING_REQUEST`.
//! `DISCOVERY` (0x00) only ever travels in a UDP datagram, never on TCP.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{DeviceStatus, DeviceStatusReport};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Frame header: 1 opcode byte followed by a 4-byte big-endian payload length.
pub const HEADER_SIZE: usize = 5;

/// Default upper bound for a single payload.  Status JSON is a few hundred
/// bytes, so anything near this is garbage or hostile.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 1024 * 1024;

// ── Opcodes ───────────────────────────────────────────────────────────────────

/// Every opcode defined by the tablet protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // UDP presence broadcast
    Discovery = 0x00,
    // Server → tablet
    LockScreen = 0x01,
    UnlockScreen = 0x02,
    RefreshConfig = 0x03,
    Unpair = 0x04,
    DistributeMaterial = 0x05,
    HandAck = 0x06,
    // Tablet → server
    StatusUpdate = 0x10,
    HandRaised = 0x11,
    DistributeAck = 0x12,
    // Pairing handshake
    PairingRequest = 0x20,
    PairingAck = 0x21,
}

impl TryFrom<u8> for Opcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x00 => Ok(Opcode::Discovery),
            0x01 => Ok(Opcode::LockScreen),
            0x02 => Ok(Opcode::UnlockScreen),
            0x03 => Ok(Opcode::RefreshConfig),
            0x04 => Ok(Opcode::Unpair),
            0x05 => Ok(Opcode::DistributeMaterial),
            0x06 => Ok(Opcode::HandAck),
            0x10 => Ok(Opcode::StatusUpdate),
            0x11 => Ok(Opcode::HandRaised),
            0x12 => Ok(Opcode::DistributeAck),
            0x20 => Ok(Opcode::PairingRequest),
            0x21 => Ok(Opcode::PairingAck),
            _ => Err(()),
        }
    }
}

// ── Tablet → server ───────────────────────────────────────────────────────────

/// Frames a tablet sends to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceMessage {
    /// First frame on every connection; binds the socket to a device id.
    PairingRequest { device_id: Uuid },
    StatusUpdate(DeviceStatusReport),
    HandRaised { device_id: Uuid },
    /// The tablet has fetched the material it was told about.
    DistributeAck { device_id: Uuid },
}

impl DeviceMessage {
    pub fn opcode(&self) -> Opcode {
        match self {
            DeviceMessage::PairingRequest { .. } => Opcode::PairingRequest,
            DeviceMessage::StatusUpdate(_) => Opcode::StatusUpdate,
            DeviceMessage::HandRaised { .. } => Opcode::HandRaised,
            DeviceMessage::DistributeAck { .. } => Opcode::DistributeAck,
        }
    }

    /// The device id the frame claims to come from.
    pub fn device_id(&self) -> Uuid {
        match self {
            DeviceMessage::StatusUpdate(report) => report.device_id,
            DeviceMessage::PairingRequest { device_id }
            | DeviceMessage::HandRaised { device_id }
            | DeviceMessage::DistributeAck { device_id } => *device_id,
        }
    }
}

// ── Server → tablet ───────────────────────────────────────────────────────────

/// Commands the server sends down a tablet's connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerCommand {
    LockScreen,
    UnlockScreen,
    /// Ask the tablet to re-fetch `GET /api/v1/config/{id}`.
    RefreshConfig,
    Unpair,
    /// New material is waiting at `GET /api/v1/distribution/{id}`.
    DistributeMaterial,
    /// The teacher has seen the raised hand.
    HandAck { device_id: Uuid },
    /// Reply to a successful `PairingRequest`.
    PairingAck,
}

impl ServerCommand {
    pub fn opcode(&self) -> Opcode {
        match self {
            ServerCommand::LockScreen => Opcode::LockScreen,
            ServerCommand::UnlockScreen => Opcode::UnlockScreen,
            ServerCommand::RefreshConfig => Opcode::RefreshConfig,
            ServerCommand::Unpair => Opcode::Unpair,
            ServerCommand::DistributeMaterial => Opcode::DistributeMaterial,
            ServerCommand::HandAck { .. } => Opcode::HandAck,
            ServerCommand::PairingAck => Opcode::PairingAck,
        }
    }
}

// ── Acknowledged control commands ─────────────────────────────────────────────

/// Teacher commands whose effect the server waits to see confirmed.
///
/// The tablet never replies to these directly.  A lock or unlock counts as
/// done once the tablet reports the matching status; a config refresh counts
/// as done once the tablet fetches `GET /api/v1/config/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlCommand {
    LockScreen,
    UnlockScreen,
    RefreshConfig,
}

impl ControlCommand {
    /// The frame sent down the tablet's connection.
    pub fn server_command(self) -> ServerCommand {
        match self {
            ControlCommand::LockScreen => ServerCommand::LockScreen,
            ControlCommand::UnlockScreen => ServerCommand::UnlockScreen,
            ControlCommand::RefreshConfig => ServerCommand::RefreshConfig,
        }
    }

    /// Wire name, as used in logs and push messages.
    pub fn name(self) -> &'static str {
        match self {
            ControlCommand::LockScreen => "LOCK_SCREEN",
            ControlCommand::UnlockScreen => "UNLOCK_SCREEN",
            ControlCommand::RefreshConfig => "REFRESH_CONFIG",
        }
    }

    /// Whether a status report of `status` confirms this command.
    pub fn confirmed_by_status(self, status: DeviceStatus) -> bool {
        match self {
            ControlCommand::LockScreen => status == DeviceStatus::Locked,
            ControlCommand::UnlockScreen => {
                matches!(status, DeviceStatus::OnTask | DeviceStatus::Idle)
            }
            ControlCommand::RefreshConfig => false,
        }
    }
}

impl std::fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
