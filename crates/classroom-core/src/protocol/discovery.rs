//! The UDP presence datagram the server broadcasts to the LAN.
//!
//! # Datagram layout (for beginners)
//!
//! Tablets do not know the server's address when they start.  The server
//! therefore shouts a tiny fixed-size datagram to the LAN broadcast address
//! every few seconds, and a tablet listening on the discovery port learns
//! where to connect from it:
//!
//! ```text
//! offset  size  field
//! 0       1     opcode 0x00 (DISCOVERY)
//! 1       4     IPv4 address, network byte order
//! 5       2     HTTP port, little-endian
//! 7       2     TCP port, little-endian
//! ```
//!
//! Unlike TCP frames there is no length header: a datagram arrives whole or
//! not at all.  The ports are little-endian because that is what deployed
//! tablets read.

use std::net::Ipv4Addr;

use crate::protocol::codec::ProtocolError;
use crate::protocol::messages::Opcode;

/// Size of an encoded [`DiscoveryAnnouncement`].
pub const DISCOVERY_DATAGRAM_LEN: usize = 9;

/// Where tablets can reach the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryAnnouncement {
    pub ip: Ipv4Addr,
    pub http_port: u16,
    pub tcp_port: u16,
}

impl DiscoveryAnnouncement {
    pub fn encode(&self) -> [u8; DISCOVERY_DATAGRAM_LEN] {
        let mut buf = [0u8; DISCOVERY_DATAGRAM_LEN];
        buf[0] = Opcode::Discovery as u8;
        buf[1..5].copy_from_slice(&self.ip.octets());
        buf[5..7].copy_from_slice(&self.http_port.to_le_bytes());
        buf[7..9].copy_from_slice(&self.tcp_port.to_le_bytes());
        buf
    }

    /// Parses a received datagram.  Trailing bytes are ignored.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InsufficientData`] if fewer than
    ///   [`DISCOVERY_DATAGRAM_LEN`] bytes arrived.
    /// - [`ProtocolError::UnknownOpcode`] if the first byte is not `DISCOVERY`.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < DISCOVERY_DATAGRAM_LEN {
            return Err(ProtocolError::InsufficientData {
                needed: DISCOVERY_DATAGRAM_LEN,
                available: bytes.len(),
            });
        }
        if bytes[0] != Opcode::Discovery as u8 {
            return Err(ProtocolError::UnknownOpcode {
                opcode: bytes[0],
                frame_len: bytes.len(),
            });
        }

        Ok(Self {
            ip: Ipv4Addr::new(bytes[1], bytes[2], bytes[3], bytes[4]),
            http_port: u16::from_le_bytes([bytes[5], bytes[6]]),
            tcp_port: u16::from_le_bytes([bytes[7], bytes[8]]),
        })
    }
}
