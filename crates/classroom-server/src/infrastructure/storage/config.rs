//! TOML-based configuration for the classroom server.
//!
//! The default file lives in the platform config directory:
//! - Windows:  `%APPDATA%\ClassroomHub\server.toml`
//! - Linux:    `~/.config/classroom-hub/server.toml`
//! - macOS:    `~/Library/Application Support/ClassroomHub/server.toml`
//!
//! Every field has a default, so a missing file, a missing section, or a
//! missing key all fall back to the values below:
//!
//! ```toml
//! [server]
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! http_port = 5911
//! tcp_port = 5912
//! udp_port = 5913
//! hub_port = 5914
//!
//! [distribution]
//! deadline_secs = 30
//! max_frame_bytes = 1048576
//!
//! [protocol]
//! heartbeat_timeout_secs = 10
//! control_deadline_secs = 10
//!
//! [discovery]
//! enabled = true
//! interval_ms = 3000
//!
//! [device]
//! kiosk_mode = true
//! text_size = "medium"
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use classroom_core::protocol::DEFAULT_MAX_PAYLOAD_LEN;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: GeneralConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub distribution: DistributionConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub discovery: DiscoverySettings,
    #[serde(default)]
    pub device: DeviceSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralConfig {
    /// `tracing` filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Listening ports and bind address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    /// IP address every listener binds to.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// REST API used by the tablets.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Binary device protocol.
    #[serde(default = "default_tcp_port")]
    pub tcp_port: u16,
    /// Destination port of the presence broadcast.
    #[serde(default = "default_udp_port")]
    pub udp_port: u16,
    /// WebSocket endpoint for teacher UI clients.
    #[serde(default = "default_hub_port")]
    pub hub_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DistributionConfig {
    /// How long a tablet has to fetch newly assigned material.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    /// Largest accepted device frame payload.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

/// Liveness and confirmation timeouts on device connections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolConfig {
    /// A connection silent for this long counts as disconnected.
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,
    /// How long a lock, unlock or config refresh may go unconfirmed.
    #[serde(default = "default_control_deadline_secs")]
    pub control_deadline_secs: u64,
}

/// UDP presence broadcast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoverySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

/// Settings handed to every tablet by `GET /api/v1/config/{deviceId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceSettings {
    #[serde(default = "default_true")]
    pub kiosk_mode: bool,
    #[serde(default = "default_text_size")]
    pub text_size: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    5911
}
fn default_tcp_port() -> u16 {
    5912
}
fn default_udp_port() -> u16 {
    5913
}
fn default_hub_port() -> u16 {
    5914
}
fn default_heartbeat_timeout_secs() -> u64 {
    10
}
fn default_control_deadline_secs() -> u64 {
    10
}
fn default_interval_ms() -> u64 {
    3000
}
fn default_deadline_secs() -> u64 {
    30
}
fn default_max_frame_bytes() -> usize {
    DEFAULT_MAX_PAYLOAD_LEN
}
fn default_true() -> bool {
    true
}
fn default_text_size() -> String {
    "medium".to_string()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            tcp_port: default_tcp_port(),
            udp_port: default_udp_port(),
            hub_port: default_hub_port(),
        }
    }
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            control_deadline_secs: default_control_deadline_secs(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_ms: default_interval_ms(),
        }
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            kiosk_mode: default_true(),
            text_size: default_text_size(),
        }
    }
}

impl NetworkConfig {
    /// Parsed bind address; an unparsable value falls back to all interfaces.
    pub fn bind_ip(&self) -> IpAddr {
        self.bind_address
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
    }

    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip(), self.http_port)
    }

    pub fn tcp_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip(), self.tcp_port)
    }

    pub fn hub_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip(), self.hub_port)
    }
}

impl DistributionConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl ProtocolConfig {
    pub fn heartbeat_timeout(&self) -> Duration {
        Duration::from_secs(self.heartbeat_timeout_secs)
    }

    pub fn control_deadline(&self) -> Duration {
        Duration::from_secs(self.control_deadline_secs)
    }
}

impl DiscoverySettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the default config file path.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("server.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads the config at `path`, returning defaults if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &ServerConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("ClassroomHub"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("classroom-hub"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("ClassroomHub")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("classroom_cfg_{}", Uuid::new_v4()))
            .join("server.toml")
    }

    #[test]
    fn test_default_ports() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.network.http_port, 5911);
        assert_eq!(cfg.network.tcp_port, 5912);
        assert_eq!(cfg.network.udp_port, 5913);
        assert_eq!(cfg.network.hub_port, 5914);
    }

    #[test]
    fn test_default_timeouts_and_discovery() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.protocol.heartbeat_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.protocol.control_deadline(), Duration::from_secs(10));
        assert!(cfg.discovery.enabled);
        assert_eq!(cfg.discovery.interval(), Duration::from_millis(3000));
    }

    #[test]
    fn test_default_device_settings() {
        let cfg = DeviceSettings::default();
        assert!(cfg.kiosk_mode);
        assert_eq!(cfg.text_size, "medium");
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: ServerConfig = toml::from_str("").expect("empty document is valid");
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        // Arrange
        let toml_str = r#"
[distribution]
deadline_secs = 5
"#;

        // Act
        let cfg: ServerConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.distribution.deadline(), Duration::from_secs(5));
        assert_eq!(cfg.distribution.max_frame_bytes, DEFAULT_MAX_PAYLOAD_LEN);
        assert_eq!(cfg.server.log_level, "info");
    }

    #[test]
    fn test_unparsable_bind_address_falls_back_to_unspecified() {
        let network = NetworkConfig {
            bind_address: "not-an-ip".into(),
            ..NetworkConfig::default()
        };
        assert_eq!(
            network.tcp_addr(),
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 5912)
        );
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let cfg = load_config(&temp_path()).expect("missing file is not an error");
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_load_malformed_file_is_parse_error() {
        let path = temp_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_save_then_load_round_trip() {
        // Arrange
        let path = temp_path();
        let mut cfg = ServerConfig::default();
        cfg.network.tcp_port = 6000;
        cfg.device.text_size = "large".into();

        // Act: save_config must create the missing parent directory
        save_config(&cfg, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        // Assert
        assert_eq!(loaded, cfg);
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_default_config_path_file_name() {
        if let Ok(path) = default_config_path() {
            assert!(path.ends_with("server.toml"), "got {path:?}");
        }
    }
}
