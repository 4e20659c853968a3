//! # classroom-core
//!
//! Shared library for the classroom hub containing the lesson entities, the
//! in-process event bus, and the binary protocol spoken by student tablets.
//!
//! This crate is used by both the server and the hub crates.
//! It has zero dependencies on sockets, HTTP frameworks, or storage engines.
//!
//! # Architecture overview (for beginners)
//!
//! The classroom hub pairs student tablets with a teacher's controller,
//! pushes lesson material to the tablets, and collects the students'
//! answers.  Tablets talk to the server over a long-lived TCP connection
//! (live status, hand-raises) and over HTTP (fetching material, submitting
//! responses).  Teacher-facing UI clients receive live updates over a
//! WebSocket push channel.
//!
//! This crate (`classroom-core`) is the shared foundation.  It defines:
//!
//! - **`domain`** – Plain entities: devices, materials, questions, responses,
//!   feedback, and sessions.  Question and response kinds are sum types so
//!   every rule about them is an exhaustive `match`.
//!
//! - **`events`** – A small publish/subscribe bus.  Subscribing returns a
//!   [`Subscription`] handle; dropping or unsubscribing it severs the handler.
//!
//! - **`protocol`** – How bytes travel between a tablet and the server.
//!   Frames are `[opcode:1][payload_len:4][payload]` and are decoded into
//!   typed Rust enums on the other end.  The server's UDP presence
//!   broadcast has its own fixed 9-byte layout.

pub mod domain;
pub mod events;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `classroom_core::Question` instead of `classroom_core::domain::question::Question`.
pub use domain::{
    DeviceStatus, DeviceStatusReport, Feedback, Material, MaterialType, PairedDevice, Question,
    QuestionKind, QuestionVariant, Response, ResponseAnswer, Session, SessionStatus,
};
pub use events::{EventBus, ProtocolEvent, RegistryEvent, Subscription};
pub use protocol::{
    decode_device_message, encode_command, ControlCommand, DeviceMessage, DiscoveryAnnouncement,
    ProtocolError, ServerCommand,
};
