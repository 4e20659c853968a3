//! classroom-server library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/` and
//! the `classroom-server` binary share the same module tree.
//!
//! - **`application`** – Services holding the classroom rules: pairing,
//!   distribution, sessions, question and response validation, feedback.
//! - **`infrastructure`** – Everything that touches the outside world: the
//!   tablet TCP protocol, the HTTP API, configuration files, and storage.

pub mod application;
pub mod infrastructure;
