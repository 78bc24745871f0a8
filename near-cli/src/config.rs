//! Configuration for the nearlink CLI.
//!
//! Loaded from a TOML file (default: `nearlink.toml`). Every section and
//! field is optional.

use nearlink_client::{
    BondConfig, ClientConfig, ScanConfig, SenderConfig, DEFAULT_MACHINE_ID_PATH,
};
use nearlink_core::{KnownIds, RetryPolicy, BROADCASTER_ID};
use nearlink_listener::ListenerConfig;
use nearlink_types::{ServiceId, StableId, TypesError, SERIAL_PORT_SERVICE_UUID};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "nearlink.toml";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Radio selection.
    pub radio: RadioConfig,
    /// Service shared by sender and listener.
    pub service: ServiceConfig,
    /// Discovery.
    pub scan: ScanSection,
    /// Delivery.
    pub sender: SenderSection,
    /// Bonding.
    pub bond: BondSection,
    /// Listener/Server.
    pub listener: ListenerSection,
    /// Local identity.
    pub identity: IdentityConfig,
    /// Known role ids.
    pub roles: RolesConfig,
}

/// Radio configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RadioConfig {
    /// Use the in-memory radio (same as `--mock`).
    #[serde(default)]
    pub mock: bool,
    /// Address of the in-memory radio.
    #[serde(default = "default_mock_address")]
    pub mock_address: String,
}

/// Service identifier configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service UUID (default: serial port profile).
    #[serde(default = "default_service_uuid")]
    pub uuid: String,
    /// RFCOMM channel, 1-30 (default: 1).
    #[serde(default = "default_channel")]
    pub channel: u8,
}

/// Discovery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanSection {
    /// Scan duration in milliseconds (default: 10000).
    #[serde(default = "default_scan_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra wait after the timeout for late names (default: 300).
    #[serde(default = "default_scan_settle_ms")]
    pub settle_ms: u64,
}

/// Delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SenderSection {
    /// Connect attempts, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Bound on each connect attempt in milliseconds (default: 10000).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Flat delay between attempts in milliseconds (default: 1000).
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Pause after writing, before closing, in milliseconds (default: 500).
    #[serde(default = "default_post_write_settle_ms")]
    pub settle_ms: u64,
}

/// Bonding configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BondSection {
    /// Bound on the wait for a terminal bond signal in seconds.
    /// `0` waits forever (default: 30).
    #[serde(default = "default_bond_timeout_secs")]
    pub timeout_secs: u64,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenerSection {
    /// Bound on one accept attempt in milliseconds (default: 10000).
    #[serde(default = "default_accept_wait_ms")]
    pub accept_wait_ms: u64,
    /// Bytes read from each connection (default: 1024).
    #[serde(default = "default_read_buffer")]
    pub read_buffer: usize,
    /// Pause after an accept error in milliseconds (default: 250).
    #[serde(default = "default_accept_error_pause_ms")]
    pub accept_error_pause_ms: u64,
}

/// Identity configuration.
///
/// With both `name` and `stable_id` set the identity is fixed; otherwise it
/// is derived from the machine id and the radio's name.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Fixed local name.
    pub name: Option<String>,
    /// Fixed stable id.
    pub stable_id: Option<String>,
    /// Machine id file the stable id is hashed from.
    #[serde(default = "default_machine_id_path")]
    pub machine_id_path: PathBuf,
}

/// Known role ids.
#[derive(Debug, Clone, Deserialize)]
pub struct RolesConfig {
    /// Ids that resolve to the broadcaster role.
    #[serde(default = "default_broadcasters")]
    pub broadcasters: Vec<String>,
    /// Ids that resolve to the receiver role.
    #[serde(default)]
    pub receivers: Vec<String>,
}

// Default value functions
fn default_mock_address() -> String {
    "AA:AA:AA:AA:AA:01".to_string()
}

fn default_service_uuid() -> String {
    SERIAL_PORT_SERVICE_UUID.to_string()
}

fn default_channel() -> u8 {
    1
}

fn default_scan_timeout_ms() -> u64 {
    10_000
}

fn default_scan_settle_ms() -> u64 {
    300
}

fn default_max_attempts() -> u32 {
    3
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_backoff_ms() -> u64 {
    1_000
}

fn default_post_write_settle_ms() -> u64 {
    500
}

fn default_bond_timeout_secs() -> u64 {
    30
}

fn default_accept_wait_ms() -> u64 {
    10_000
}

fn default_read_buffer() -> usize {
    1024
}

fn default_accept_error_pause_ms() -> u64 {
    250
}

fn default_machine_id_path() -> PathBuf {
    PathBuf::from(DEFAULT_MACHINE_ID_PATH)
}

fn default_broadcasters() -> Vec<String> {
    vec![BROADCASTER_ID.to_string()]
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            mock: false,
            mock_address: default_mock_address(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            uuid: default_service_uuid(),
            channel: default_channel(),
        }
    }
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            timeout_ms: default_scan_timeout_ms(),
            settle_ms: default_scan_settle_ms(),
        }
    }
}

impl Default for SenderSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            connect_timeout_ms: default_connect_timeout_ms(),
            backoff_ms: default_backoff_ms(),
            settle_ms: default_post_write_settle_ms(),
        }
    }
}

impl Default for BondSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_bond_timeout_secs(),
        }
    }
}

impl Default for ListenerSection {
    fn default() -> Self {
        Self {
            accept_wait_ms: default_accept_wait_ms(),
            read_buffer: default_read_buffer(),
            accept_error_pause_ms: default_accept_error_pause_ms(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name: None,
            stable_id: None,
            machine_id_path: default_machine_id_path(),
        }
    }
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            broadcasters: default_broadcasters(),
            receivers: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Load `path` if given; otherwise `nearlink.toml` when present, else
    /// defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// The configured service identifier.
    pub fn service_id(&self) -> Result<ServiceId, TypesError> {
        ServiceId::parse(&self.service.uuid, self.service.channel)
    }

    /// Known ids for role resolution.
    pub fn known_ids(&self) -> KnownIds {
        KnownIds {
            broadcasters: self.roles.broadcasters.iter().map(StableId::new).collect(),
            receivers: self.roles.receivers.iter().map(StableId::new).collect(),
        }
    }

    /// Client component settings.
    pub fn client_config(&self) -> Result<ClientConfig, TypesError> {
        Ok(ClientConfig {
            scan: ScanConfig {
                timeout: Duration::from_millis(self.scan.timeout_ms),
                settle_delay: Duration::from_millis(self.scan.settle_ms),
            },
            bond: BondConfig {
                timeout: match self.bond.timeout_secs {
                    0 => None,
                    secs => Some(Duration::from_secs(secs)),
                },
            },
            sender: SenderConfig {
                retry: RetryPolicy {
                    max_attempts: self.sender.max_attempts,
                    connect_timeout: Duration::from_millis(self.sender.connect_timeout_ms),
                    backoff: Duration::from_millis(self.sender.backoff_ms),
                },
                settle_delay: Duration::from_millis(self.sender.settle_ms),
                service: self.service_id()?,
            },
            known_ids: self.known_ids(),
        })
    }

    /// Listener settings.
    pub fn listener_config(&self) -> Result<ListenerConfig, TypesError> {
        Ok(ListenerConfig {
            service: self.service_id()?,
            accept_wait: Duration::from_millis(self.listener.accept_wait_ms),
            read_buffer: self.listener.read_buffer,
            accept_error_pause: Duration::from_millis(self.listener.accept_error_pause_ms),
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
