//! classroom-hub library crate.
//!
//! This crate carries live classroom events (a tablet paired, a status
//! changed, a hand went up, material was never fetched) from the server to
//! every connected teacher UI client.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! DeviceRegistry / PairingProtocolService  (EventBus publishers)
//!         ↓
//! [classroom-hub]
//!   ├── domain/           Pure types: PushMessage, HubConfig
//!   ├── application/      HubEventBridge: event → push message
//!   └── infrastructure/
//!         ├── broadcaster/ Per-client bounded queues (PushSink impl)
//!         └── ws_server/   WebSocket accept loop (tokio-tungstenite)
//!         ↓
//! Teacher UI (JSON over WebSocket)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `classroom-core` only.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.
//!
//! # For beginners: why is the bridge separate from the server?
//!
//! The tablet protocol must never wait on a slow browser.  The bridge only
//! ever hands a message to a non-blocking sink, so a stalled UI client can
//! lose messages but can never stall a tablet's connection.

/// Domain layer: push-message schema and configuration.
pub mod domain;

/// Application layer: the event bridge and its sink seam.
pub mod application;

/// Infrastructure layer: client queues and the WebSocket server.
pub mod infrastructure;
