//! Hub configuration.

use std::net::{Ipv4Addr, SocketAddr};

/// Default WebSocket port for teacher UI clients.
pub const DEFAULT_HUB_PORT: u16 = 5914;

/// Runtime settings for the push hub.
///
/// The server builds this from its own `[network]` configuration; the
/// defaults are meant for local development and tests.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Address the WebSocket server binds to.
    pub bind_addr: SocketAddr,

    /// Messages queued per client before newer ones are dropped for that
    /// client.
    pub client_buffer: usize,
}

impl Default for HubConfig {
    /// | Field         | Default         |
    /// |---------------|-----------------|
    /// | bind_addr     | `0.0.0.0:5914`  |
    /// | client_buffer | 256             |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_HUB_PORT)),
            client_buffer: 256,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port_is_5914() {
        // Arrange / Act
        let cfg = HubConfig::default();
        // Assert
        assert_eq!(cfg.bind_addr.port(), 5914);
        assert!(cfg.bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_client_buffer_is_nonzero() {
        assert!(HubConfig::default().client_buffer > 0);
    }
}
