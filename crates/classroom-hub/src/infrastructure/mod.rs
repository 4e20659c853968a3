//! Infrastructure layer for classroom-hub.
//!
//! # Responsibilities
//!
//! - Keeping one bounded queue per connected UI client
//! - Binding the WebSocket listener and performing the upgrade handshake
//! - Writing queued push messages to each client as JSON text frames
//!
//! # What does NOT belong here?
//!
//! - Deciding which events become which messages (that is the application layer)

pub mod broadcaster;
pub mod ws_server;

pub use broadcaster::ClientBroadcaster;
pub use ws_server::{run_server, serve};
