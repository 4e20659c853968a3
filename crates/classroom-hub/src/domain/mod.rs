//! Domain layer for classroom-hub.
//!
//! Only plain data lives here: the JSON "language" spoken to teacher UI
//! clients and the hub's configuration.  No `tokio`, no sockets.

pub mod config;
pub mod messages;

pub use config::HubConfig;
pub use messages::{ControlFailurePayload, DeviceIdPayload, PushMessage};
