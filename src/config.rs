//! Configuration
//!
//! Settings come from the process environment. Application settings are looked up as
//! `TXTOP_<NAME>` first and then as bare `<NAME>`; node settings use the usual
//! `CARDANO_*` names shared with other node tooling.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::connection::{expand_path, ConnectionConfig};
use crate::logbuf::DEFAULT_LOG_LINES;

/// Prefix for application settings
pub const ENV_PREFIX: &str = "TXTOP";

pub const DEFAULT_REFRESH_SECS: u64 = 3;
pub const DEFAULT_RETRIES: u32 = 3;
pub const DEFAULT_MAX_BACKOFF_SECS: u64 = 30;
pub const DEFAULT_MAX_DISPLAYED: usize = 100;
pub const DEFAULT_NODE_NETWORK: &str = "mainnet";
pub const DEFAULT_SOCKET_PATH: &str = "/opt/cardano/ipc/socket";

/// Socket path used when the application-level `NETWORK` setting picks the network
pub const CONTAINER_SOCKET_PATH: &str = "/ipc/node.socket";

/// Named networks and their protocol magic numbers
pub const KNOWN_NETWORKS: &[(&str, u32)] = &[
    ("mainnet", 764824073),
    ("preprod", 1),
    ("preview", 2),
    ("sanchonet", 4),
];

/// Errors that can occur while loading configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    #[error("unable to set network magic")]
    NoNetwork,

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: String, value: String },

    #[error("{name} must be at least {min}")]
    OutOfRange { name: String, min: u64 },
}

/// Order in which mempool entries are displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Largest transactions first
    #[default]
    BySize,
    /// Order in which the node handed the transactions out
    ByArrivalOrder,
}

impl SortMode {
    pub fn toggled(self) -> Self {
        match self {
            SortMode::BySize => SortMode::ByArrivalOrder,
            SortMode::ByArrivalOrder => SortMode::BySize,
        }
    }

    /// Short label shown in the status line
    pub fn label(self) -> &'static str {
        match self {
            SortMode::BySize => "size",
            SortMode::ByArrivalOrder => "time",
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SortMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "size" => Ok(SortMode::BySize),
            "time" | "arrival" => Ok(SortMode::ByArrivalOrder),
            _ => Err(ConfigError::InvalidValue {
                name: "SORT".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Where the node can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Local UNIX socket
    Unix(PathBuf),
    /// Remote host and port
    Tcp { host: String, port: u16 },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Unix(path) => write!(f, "unix:{}", path.display()),
            Target::Tcp { host, port } => write!(f, "tcp:{}:{}", host, port),
        }
    }
}

/// Dashboard behaviour settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Named network; overrides the node network when set
    pub network: String,
    pub refresh_secs: u64,
    pub retries: u32,
    pub max_backoff_secs: u64,
    pub log_lines: usize,
    pub max_displayed: usize,
    pub sort: SortMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            network: String::new(),
            refresh_secs: DEFAULT_REFRESH_SECS,
            retries: DEFAULT_RETRIES,
            max_backoff_secs: DEFAULT_MAX_BACKOFF_SECS,
            log_lines: DEFAULT_LOG_LINES,
            max_displayed: DEFAULT_MAX_DISPLAYED,
            sort: SortMode::BySize,
        }
    }
}

/// Node connection settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    pub network: String,
    pub network_magic: u32,
    pub socket_path: String,
    pub address: String,
    pub port: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NODE_NETWORK.to_string(),
            network_magic: 0,
            socket_path: DEFAULT_SOCKET_PATH.to_string(),
            address: String::new(),
            port: 0,
        }
    }
}

impl NodeConfig {
    /// Resolve the dial target: host and port take precedence over the socket path.
    ///
    /// Returns `None` when neither is configured.
    pub fn target(&self) -> Option<Target> {
        if !self.address.is_empty() && self.port > 0 {
            return Some(Target::Tcp {
                host: self.address.clone(),
                port: self.port,
            });
        }
        if !self.socket_path.is_empty() {
            return Some(Target::Unix(PathBuf::from(expand_path(&self.socket_path))));
        }
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub app: AppConfig,
    pub node: NodeConfig,
}

/// Look up a known network's magic by name
pub fn network_magic_by_name(name: &str) -> Option<u32> {
    KNOWN_NETWORKS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(name))
        .map(|(_, magic)| *magic)
}

/// Source of raw setting values
pub trait Lookup {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads from the process environment
pub struct ProcessEnv;

impl Lookup for ProcessEnv {
    fn get(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

impl Lookup for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

fn app_var(lookup: &dyn Lookup, name: &str) -> Option<String> {
    lookup
        .get(&format!("{}_{}", ENV_PREFIX, name))
        .or_else(|| lookup.get(name))
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
    }
}

fn at_least(name: &str, value: u64, min: u64) -> Result<(), ConfigError> {
    if value < min {
        return Err(ConfigError::OutOfRange {
            name: name.to_string(),
            min,
        });
    }
    Ok(())
}

impl Config {
    /// Load configuration from the process environment, reading `.env` first if present
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(&ProcessEnv)
    }

    /// Build configuration from an arbitrary lookup
    pub fn from_lookup(lookup: &dyn Lookup) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(network) = app_var(lookup, "NETWORK") {
            config.app.network = network.trim().to_string();
        }
        if let Some(v) = parse_var("REFRESH", app_var(lookup, "REFRESH"))? {
            config.app.refresh_secs = v;
        }
        if let Some(v) = parse_var("RETRIES", app_var(lookup, "RETRIES"))? {
            config.app.retries = v;
        }
        if let Some(v) = parse_var("MAX_BACKOFF", app_var(lookup, "MAX_BACKOFF"))? {
            config.app.max_backoff_secs = v;
        }
        if let Some(v) = parse_var("LOG_LINES", app_var(lookup, "LOG_LINES"))? {
            config.app.log_lines = v;
        }
        if let Some(v) = parse_var("MAX_DISPLAYED", app_var(lookup, "MAX_DISPLAYED"))? {
            config.app.max_displayed = v;
        }
        if let Some(v) = parse_var::<SortMode>("SORT", app_var(lookup, "SORT"))? {
            config.app.sort = v;
        }

        if let Some(network) = lookup.get("CARDANO_NETWORK") {
            config.node.network = network.trim().to_string();
        }
        if let Some(v) = parse_var(
            "CARDANO_NODE_NETWORK_MAGIC",
            lookup.get("CARDANO_NODE_NETWORK_MAGIC"),
        )? {
            config.node.network_magic = v;
        }
        if let Some(path) = lookup.get("CARDANO_NODE_SOCKET_PATH") {
            config.node.socket_path = path;
        }
        if let Some(address) = lookup.get("CARDANO_NODE_SOCKET_TCP_HOST") {
            config.node.address = address.trim().to_string();
        }
        if let Some(v) = parse_var(
            "CARDANO_NODE_SOCKET_TCP_PORT",
            lookup.get("CARDANO_NODE_SOCKET_TCP_PORT"),
        )? {
            config.node.port = v;
        }

        at_least("REFRESH", config.app.refresh_secs, 1)?;
        at_least("MAX_DISPLAYED", config.app.max_displayed as u64, 1)?;
        at_least("LOG_LINES", config.app.log_lines as u64, 1)?;

        config.populate_network_magic()?;
        Ok(config)
    }

    /// Fill in the network magic from a named network unless one was given explicitly
    pub fn populate_network_magic(&mut self) -> Result<(), ConfigError> {
        if self.node.network_magic != 0 {
            return Ok(());
        }
        if !self.app.network.is_empty() {
            let magic = network_magic_by_name(&self.app.network)
                .ok_or_else(|| ConfigError::UnknownNetwork(self.app.network.clone()))?;
            self.node.network = self.app.network.clone();
            self.node.network_magic = magic;
            self.node.socket_path = CONTAINER_SOCKET_PATH.to_string();
            return Ok(());
        }
        if !self.node.network.is_empty() {
            let magic = network_magic_by_name(&self.node.network)
                .ok_or_else(|| ConfigError::UnknownNetwork(self.node.network.clone()))?;
            self.node.network_magic = magic;
            return Ok(());
        }
        Err(ConfigError::NoNetwork)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.app.refresh_secs)
    }

    /// Settings for the connection manager
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig {
            target: self.node.target(),
            network_magic: self.node.network_magic,
            max_retries: self.app.retries,
            max_backoff: Duration::from_secs(self.app.max_backoff_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    // ==================== Defaults tests ====================

    #[test]
    fn test_defaults_resolve_mainnet() {
        let config = Config::from_lookup(&lookup(&[])).unwrap();
        assert_eq!(config.node.network, "mainnet");
        assert_eq!(config.node.network_magic, 764824073);
        assert_eq!(config.node.socket_path, DEFAULT_SOCKET_PATH);
        assert_eq!(config.app.refresh_secs, DEFAULT_REFRESH_SECS);
        assert_eq!(config.app.retries, DEFAULT_RETRIES);
        assert_eq!(config.app.max_displayed, DEFAULT_MAX_DISPLAYED);
        assert_eq!(config.app.sort, SortMode::BySize);
    }

    // ==================== Network resolution tests ====================

    #[test]
    fn test_app_network_overrides_node_network_and_socket() {
        let config = Config::from_lookup(&lookup(&[("NETWORK", "preview")])).unwrap();
        assert_eq!(config.node.network, "preview");
        assert_eq!(config.node.network_magic, 2);
        assert_eq!(config.node.socket_path, CONTAINER_SOCKET_PATH);
    }

    #[test]
    fn test_prefixed_name_wins_over_bare_name() {
        let config = Config::from_lookup(&lookup(&[
            ("TXTOP_NETWORK", "preprod"),
            ("NETWORK", "preview"),
        ]))
        .unwrap();
        assert_eq!(config.node.network_magic, 1);
    }

    #[test]
    fn test_unknown_app_network_is_error() {
        let err = Config::from_lookup(&lookup(&[("NETWORK", "atlantis")])).unwrap_err();
        assert_eq!(err, ConfigError::UnknownNetwork("atlantis".to_string()));
        assert_eq!(err.to_string(), "unknown network: atlantis");
    }

    #[test]
    fn test_unknown_node_network_is_error() {
        let err = Config::from_lookup(&lookup(&[("CARDANO_NETWORK", "nope")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownNetwork(_)));
    }

    #[test]
    fn test_no_network_at_all_is_error() {
        let err = Config::from_lookup(&lookup(&[("CARDANO_NETWORK", "")])).unwrap_err();
        assert_eq!(err, ConfigError::NoNetwork);
    }

    #[test]
    fn test_explicit_magic_skips_name_lookup() {
        let config = Config::from_lookup(&lookup(&[
            ("CARDANO_NETWORK", "nope"),
            ("CARDANO_NODE_NETWORK_MAGIC", "42"),
        ]))
        .unwrap();
        assert_eq!(config.node.network_magic, 42);
    }

    #[test]
    fn test_network_lookup_is_case_insensitive() {
        assert_eq!(network_magic_by_name("PreProd"), Some(1));
        assert_eq!(network_magic_by_name("devnet"), None);
    }

    // ==================== Numeric settings tests ====================

    #[test]
    fn test_numeric_settings_parse() {
        let config = Config::from_lookup(&lookup(&[
            ("REFRESH", "5"),
            ("RETRIES", "7"),
            ("TXTOP_MAX_BACKOFF", "12"),
            ("LOG_LINES", "50"),
            ("MAX_DISPLAYED", "20"),
            ("SORT", "time"),
        ]))
        .unwrap();
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.app.retries, 7);
        assert_eq!(config.app.max_backoff_secs, 12);
        assert_eq!(config.app.log_lines, 50);
        assert_eq!(config.app.max_displayed, 20);
        assert_eq!(config.app.sort, SortMode::ByArrivalOrder);
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let err = Config::from_lookup(&lookup(&[("REFRESH", "soon")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                name: "REFRESH".to_string(),
                value: "soon".to_string()
            }
        );
    }

    #[test]
    fn test_zero_refresh_is_rejected() {
        let err = Config::from_lookup(&lookup(&[("REFRESH", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_invalid_sort_mode() {
        let err = Config::from_lookup(&lookup(&[("SORT", "random")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    // ==================== Target tests ====================

    #[test]
    fn test_tcp_target_takes_precedence() {
        let config = Config::from_lookup(&lookup(&[
            ("CARDANO_NODE_SOCKET_TCP_HOST", "relay.local"),
            ("CARDANO_NODE_SOCKET_TCP_PORT", "30001"),
        ]))
        .unwrap();
        assert_eq!(
            config.node.target(),
            Some(Target::Tcp {
                host: "relay.local".to_string(),
                port: 30001
            })
        );
    }

    #[test]
    fn test_host_without_port_falls_back_to_socket() {
        let config = Config::from_lookup(&lookup(&[("CARDANO_NODE_SOCKET_TCP_HOST", "relay.local")]))
            .unwrap();
        assert_eq!(
            config.node.target(),
            Some(Target::Unix(PathBuf::from(DEFAULT_SOCKET_PATH)))
        );
    }

    #[test]
    fn test_no_target_when_socket_cleared() {
        let config = Config::from_lookup(&lookup(&[("CARDANO_NODE_SOCKET_PATH", "")])).unwrap();
        assert_eq!(config.node.target(), None);
        assert_eq!(config.connection().target, None);
    }

    #[test]
    fn test_target_display() {
        let tcp = Target::Tcp {
            host: "localhost".to_string(),
            port: 3001,
        };
        assert_eq!(tcp.to_string(), "tcp:localhost:3001");
        let unix = Target::Unix(PathBuf::from("/tmp/node.socket"));
        assert_eq!(unix.to_string(), "unix:/tmp/node.socket");
    }

    // ==================== SortMode tests ====================

    #[test]
    fn test_sort_mode_toggle_is_involution() {
        for mode in [SortMode::BySize, SortMode::ByArrivalOrder] {
            assert_ne!(mode.toggled(), mode);
            assert_eq!(mode.toggled().toggled(), mode);
        }
    }

    #[test]
    fn test_sort_mode_labels() {
        assert_eq!(SortMode::BySize.label(), "size");
        assert_eq!(SortMode::ByArrivalOrder.to_string(), "time");
        assert_eq!("SIZE".parse::<SortMode>().unwrap(), SortMode::BySize);
    }

    #[test]
    fn test_connection_settings_follow_app_config() {
        let config = Config::from_lookup(&lookup(&[("RETRIES", "5"), ("MAX_BACKOFF", "9")])).unwrap();
        let connection = config.connection();
        assert_eq!(connection.max_retries, 5);
        assert_eq!(connection.max_backoff, Duration::from_secs(9));
        assert_eq!(connection.network_magic, 764824073);
    }
}
