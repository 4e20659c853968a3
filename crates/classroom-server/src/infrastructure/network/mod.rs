//! Network infrastructure for the classroom server.
//!
//! # Sub-modules
//!
//! - **`pairing_service`** – TCP endpoint for tablets: pairing handshake,
//!   per-connection read loop, command write path.  Turns device frames into
//!   `ProtocolEvent`s.
//! - **`deadlines`** – One timer per device (or per device and command) that
//!   reports material nobody fetched, or a control command nobody confirmed.
//! - **`discovery`** – Periodic UDP broadcast telling tablets where the
//!   server is.

pub mod deadlines;
pub mod discovery;
pub mod pairing_service;

pub use deadlines::{AckDeadlines, ControlDeadlines, DistributionDeadlines};
pub use discovery::{run_broadcaster, DiscoveryConfig};
pub use pairing_service::{NetworkError, PairingConfig, PairingProtocolService};
