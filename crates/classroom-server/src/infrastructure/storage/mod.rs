//! Storage infrastructure.
//!
//! - **`config`** – TOML configuration file: platform path, defaults for a
//!   first run, load and save.
//! - **`memory`** – `DashMap`-backed implementations of every repository
//!   trait in `application::repositories`.

pub mod config;
pub mod memory;
