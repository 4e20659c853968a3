//! Infrastructure layer for the classroom server.
//!
//! Contains the adapters that touch the outside world: the tablet TCP
//! endpoint, the REST API, the configuration file, and in-memory storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `classroom_core`, but MUST NOT be imported by the application layer.

pub mod http;
pub mod network;
pub mod storage;
