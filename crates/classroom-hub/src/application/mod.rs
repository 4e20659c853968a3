//! Application layer for classroom-hub.
//!
//! # Responsibilities
//!
//! - Subscribing to the server's registry and protocol event buses
//! - Translating each event into the [`PushMessage`](crate::domain::PushMessage)
//!   teacher UIs understand
//! - Handing the message to a [`PushSink`] without ever blocking the publisher
//!
//! # What does NOT belong here?
//!
//! - WebSocket framing and client bookkeeping (that is infrastructure)

pub mod hub_event_bridge;

pub use hub_event_bridge::{translate_protocol_event, translate_registry_event, HubEventBridge, PushSink};
