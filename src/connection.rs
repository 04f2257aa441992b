//! Connection Manager
//!
//! Acquires a node session over a UNIX socket or TCP, retrying failed dials with
//! capped exponential backoff. Every attempt is logged.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::Target;
use crate::source::{DialError, Dialer, SourceError};

/// Default number of retries after the initial attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default ceiling for a single backoff delay
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Errors returned by [`ConnectionManager::acquire`]
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("specify either the UNIX socket path or the address/port")]
    NoTarget,

    #[error("{source} (after {attempts} attempts)")]
    Exhausted {
        attempts: u32,
        #[source]
        source: DialError,
    },
}

/// Lifecycle of the managed connection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed(String),
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
            ConnectionState::Failed(err) => write!(f, "failed: {}", err),
        }
    }
}

/// Configuration for the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Where to dial; `None` is a configuration error
    pub target: Option<Target>,
    /// Network magic passed to the handshake
    pub network_magic: u32,
    /// Retries after the initial attempt
    pub max_retries: u32,
    /// Ceiling for a single backoff delay
    pub max_backoff: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            target: None,
            network_magic: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            max_backoff: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl ConnectionConfig {
    /// Create a config for the given target with default retry settings
    pub fn with_target(target: Target) -> Self {
        Self {
            target: Some(target),
            ..Default::default()
        }
    }

    /// Delay before attempt `attempt` (the initial attempt is 0 and has no delay).
    ///
    /// Grows as `2^attempt` seconds and is capped at `max_backoff`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let secs = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_secs(secs).min(self.max_backoff)
    }

    /// Upper bound on the time [`ConnectionManager::acquire`] spends sleeping
    pub fn total_backoff(&self) -> Duration {
        (1..=self.max_retries).map(|k| self.backoff_delay(k)).sum()
    }
}

/// Whether a node socket is present at an already expanded path; checked before every UNIX dial
pub fn socket_exists(path: &Path) -> bool {
    path.exists()
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &str) -> String {
    if path.starts_with("~/") {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

/// Node connection manager with retry support
pub struct ConnectionManager<D: Dialer> {
    config: ConnectionConfig,
    dialer: D,
    errors: UnboundedSender<SourceError>,
    state: ConnectionState,
}

impl<D: Dialer> ConnectionManager<D> {
    /// Create a manager; asynchronous session errors are forwarded on `errors`
    pub fn new(config: ConnectionConfig, dialer: D, errors: UnboundedSender<SourceError>) -> Self {
        Self {
            config,
            dialer,
            errors,
            state: ConnectionState::Disconnected,
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    async fn dial_once(&self, target: &Target) -> Result<D::Client, DialError> {
        if let Target::Unix(path) = target {
            if !socket_exists(path) {
                return Err(DialError::SocketNotFound(path.display().to_string()));
            }
        }
        self.dialer
            .dial(target, self.config.network_magic, self.errors.clone())
            .await
    }

    /// Acquire a session, retrying with capped exponential backoff.
    ///
    /// Makes at most `1 + max_retries` attempts. A missing target fails immediately.
    pub async fn acquire(&mut self) -> Result<D::Client, ConnectionError> {
        let target = match &self.config.target {
            Some(target) => target.clone(),
            None => {
                error!("no node target configured");
                self.state = ConnectionState::Failed(ConnectionError::NoTarget.to_string());
                return Err(ConnectionError::NoTarget);
            }
        };

        let attempts = self.config.max_retries + 1;
        let mut attempt = 0;
        self.state = ConnectionState::Connecting;

        loop {
            let delay = self.config.backoff_delay(attempt);
            if !delay.is_zero() {
                sleep(delay).await;
            }

            info!("connecting to {} (attempt {}/{})", target, attempt + 1, attempts);
            match self.dial_once(&target).await {
                Ok(client) => {
                    info!("connected to {} on attempt {}", target, attempt + 1);
                    self.state = ConnectionState::Connected;
                    return Ok(client);
                }
                Err(e) if attempt < self.config.max_retries => {
                    attempt += 1;
                    warn!(
                        "attempt {} to {} failed: {}; retrying in {:?}",
                        attempt,
                        target,
                        e,
                        self.config.backoff_delay(attempt)
                    );
                }
                Err(e) => {
                    error!("attempt {} to {} failed: {}; giving up", attempt + 1, target, e);
                    self.state = ConnectionState::Failed(e.to_string());
                    return Err(ConnectionError::Exhausted {
                        attempts,
                        source: e,
                    });
                }
            }
        }
    }
}
