//! Binary codec for frames exchanged with student tablets.
//!
//! Wire format:
//! ```text
//! [opcode:1][payload_len:4][payload:N]
//! ```
//! `payload_len` is big-endian.  Payloads are:
//!
//! | Frame             | Payload                          |
//! |-------------------|----------------------------------|
//! | `STATUS_UPDATE`   | JSON [`DeviceStatusReport`]      |
//! | `PAIRING_REQUEST`, `HAND_RAISED`, `DISTRIBUTE_ACK`, `HAND_ACK` | device id as UTF-8 text |
//! | every other frame | empty                            |
//!
//! # Recovering from bad frames
//!
//! Every decode error except [`ProtocolError::InsufficientData`] and
//! [`ProtocolError::FrameTooLarge`] knows how long the bad frame was (see
//! [`ProtocolError::skip_len`]), so a reader can drop exactly that frame and
//! carry on with the next one.

use thiserror::Error;
use uuid::Uuid;

use crate::domain::DeviceStatusReport;
use crate::protocol::messages::{
    DeviceMessage, Opcode, ServerCommand, DEFAULT_MAX_PAYLOAD_LEN, HEADER_SIZE,
};

/// Errors that can occur during frame encoding or decoding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// Not enough bytes buffered yet for a whole frame.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The declared payload length is over the limit.  The stream cannot be
    /// resynchronised reliably after this.
    #[error("frame too large: payload of {declared} bytes exceeds limit of {max}")]
    FrameTooLarge { declared: usize, max: usize },

    /// The opcode is not defined, or is not valid in this direction.
    #[error("unknown opcode 0x{opcode:02X}")]
    UnknownOpcode { opcode: u8, frame_len: usize },

    /// The payload could not be parsed for its opcode.
    #[error("malformed {opcode:?} payload: {reason}")]
    MalformedPayload {
        opcode: Opcode,
        reason: String,
        frame_len: usize,
    },

    /// A message could not be serialised.
    #[error("failed to encode {opcode:?} payload: {reason}")]
    Encode { opcode: Opcode, reason: String },
}

impl ProtocolError {
    /// Length of the offending frame when it can be skipped on its own.
    pub fn skip_len(&self) -> Option<usize> {
        match self {
            ProtocolError::UnknownOpcode { frame_len, .. }
            | ProtocolError::MalformedPayload { frame_len, .. } => Some(*frame_len),
            _ => None,
        }
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes a frame sent by a tablet.
///
/// The server never sends these; the encoder exists for tablet simulators,
/// integration tests, and benchmarks.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if the status report cannot be
/// serialised to JSON.
///
/// # Examples
///
/// ```rust
/// use classroom_core::protocol::{decode_device_message, encode_device_message, DeviceMessage};
/// use uuid::Uuid;
///
/// let msg = DeviceMessage::HandRaised { device_id: Uuid::new_v4() };
/// let bytes = encode_device_message(&msg).unwrap();
/// let (decoded, consumed) = decode_device_message(&bytes).unwrap();
/// assert_eq!(decoded, msg);
/// assert_eq!(consumed, bytes.len());
/// ```
pub fn encode_device_message(msg: &DeviceMessage) -> Result<Vec<u8>, ProtocolError> {
    let opcode = msg.opcode();
    let payload = match msg {
        DeviceMessage::StatusUpdate(report) => {
            serde_json::to_vec(report).map_err(|e| ProtocolError::Encode {
                opcode,
                reason: e.to_string(),
            })?
        }
        DeviceMessage::PairingRequest { device_id }
        | DeviceMessage::HandRaised { device_id }
        | DeviceMessage::DistributeAck { device_id } => device_id.to_string().into_bytes(),
    };
    Ok(encode_frame(opcode, &payload))
}

/// Encodes a command for a tablet.  Commands cannot fail to encode.
pub fn encode_command(command: &ServerCommand) -> Vec<u8> {
    match command {
        ServerCommand::HandAck { device_id } => {
            encode_frame(command.opcode(), device_id.to_string().as_bytes())
        }
        _ => encode_frame(command.opcode(), &[]),
    }
}

/// Writes the header and payload of one frame.
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.push(opcode as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Decodes one tablet frame from the start of `bytes` using the default
/// payload limit.
///
/// Returns the message and the number of bytes consumed so the caller can
/// advance its read cursor.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are incomplete or malformed.
pub fn decode_device_message(bytes: &[u8]) -> Result<(DeviceMessage, usize), ProtocolError> {
    decode_device_message_limited(bytes, DEFAULT_MAX_PAYLOAD_LEN)
}

/// Like [`decode_device_message`] with an explicit payload limit.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are incomplete or malformed, or the
/// declared payload is longer than `max_payload_len`.
pub fn decode_device_message_limited(
    bytes: &[u8],
    max_payload_len: usize,
) -> Result<(DeviceMessage, usize), ProtocolError> {
    let (opcode_byte, payload, frame_len) = split_frame(bytes, max_payload_len)?;
    let opcode = match Opcode::try_from(opcode_byte) {
        Ok(op @ (Opcode::PairingRequest
        | Opcode::StatusUpdate
        | Opcode::HandRaised
        | Opcode::DistributeAck)) => op,
        _ => {
            return Err(ProtocolError::UnknownOpcode {
                opcode: opcode_byte,
                frame_len,
            })
        }
    };

    let msg = match opcode {
        Opcode::StatusUpdate => {
            let report: DeviceStatusReport =
                serde_json::from_slice(payload).map_err(|e| ProtocolError::MalformedPayload {
                    opcode,
                    reason: e.to_string(),
                    frame_len,
                })?;
            DeviceMessage::StatusUpdate(report)
        }
        Opcode::PairingRequest => DeviceMessage::PairingRequest {
            device_id: read_device_id(opcode, payload, frame_len)?,
        },
        Opcode::HandRaised => DeviceMessage::HandRaised {
            device_id: read_device_id(opcode, payload, frame_len)?,
        },
        _ => DeviceMessage::DistributeAck {
            device_id: read_device_id(opcode, payload, frame_len)?,
        },
    };
    Ok((msg, frame_len))
}

/// Decodes one server command from the start of `bytes`.
///
/// # Errors
///
/// Returns [`ProtocolError`] if the bytes are incomplete or malformed.
pub fn decode_command(bytes: &[u8]) -> Result<(ServerCommand, usize), ProtocolError> {
    let (opcode_byte, payload, frame_len) = split_frame(bytes, DEFAULT_MAX_PAYLOAD_LEN)?;
    let unknown = ProtocolError::UnknownOpcode {
        opcode: opcode_byte,
        frame_len,
    };
    let command = match Opcode::try_from(opcode_byte).map_err(|_| unknown.clone())? {
        Opcode::LockScreen => ServerCommand::LockScreen,
        Opcode::UnlockScreen => ServerCommand::UnlockScreen,
        Opcode::RefreshConfig => ServerCommand::RefreshConfig,
        Opcode::Unpair => ServerCommand::Unpair,
        Opcode::DistributeMaterial => ServerCommand::DistributeMaterial,
        Opcode::PairingAck => ServerCommand::PairingAck,
        Opcode::HandAck => ServerCommand::HandAck {
            device_id: read_device_id(Opcode::HandAck, payload, frame_len)?,
        },
        Opcode::Discovery
        | Opcode::StatusUpdate
        | Opcode::HandRaised
        | Opcode::DistributeAck
        | Opcode::PairingRequest => return Err(unknown),
    };
    Ok((command, frame_len))
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Returns `(opcode, payload, total_frame_len)` once a whole frame is buffered.
fn split_frame(bytes: &[u8], max_payload_len: usize) -> Result<(u8, &[u8], usize), ProtocolError> {
    if bytes.len() < HEADER_SIZE {
        return Err(ProtocolError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }

    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    if payload_len > max_payload_len {
        return Err(ProtocolError::FrameTooLarge {
            declared: payload_len,
            max: max_payload_len,
        });
    }

    let frame_len = HEADER_SIZE + payload_len;
    if bytes.len() < frame_len {
        return Err(ProtocolError::InsufficientData {
            needed: frame_len,
            available: bytes.len(),
        });
    }

    Ok((bytes[0], &bytes[HEADER_SIZE..frame_len], frame_len))
}

fn read_device_id(opcode: Opcode, payload: &[u8], frame_len: usize) -> Result<Uuid, ProtocolError> {
    let malformed = |reason: String| ProtocolError::MalformedPayload {
        opcode,
        reason,
        frame_len,
    };
    let text = std::str::from_utf8(payload).map_err(|e| malformed(e.to_string()))?;
    Uuid::parse_str(text.trim()).map_err(|e| malformed(format!("invalid device id: {e}")))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
