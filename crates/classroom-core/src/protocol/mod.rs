//! Tablet wire protocol: message types, the binary frame codec, and the UDP
//! discovery datagram.

pub mod codec;
pub mod discovery;
pub mod messages;

pub use codec::{
    decode_command, decode_device_message, decode_device_message_limited, encode_command,
    encode_device_message, encode_frame, ProtocolError,
};
pub use discovery::{DiscoveryAnnouncement, DISCOVERY_DATAGRAM_LEN};
pub use messages::*;
