//! txtop Library
//!
//! This crate provides the pieces of a live mempool dashboard: a resilient node
//! connection, snapshot draining and classification, a render gate, and a bounded
//! log buffer that is printed on exit.

pub mod app;
pub mod classify;
pub mod config;
pub mod connection;
pub mod logbuf;
pub mod metadata;
pub mod refresh;
pub mod snapshot;
pub mod source;
pub mod ui;

#[cfg(feature = "cardano")]
pub mod cardano;

// Re-export commonly used types
pub use classify::{classify, Category};
pub use config::{Config, ConfigError, SortMode, Target};
pub use connection::{ConnectionConfig, ConnectionError, ConnectionManager, ConnectionState};
pub use logbuf::{FlushOnExit, LogBuffer};
pub use refresh::{RefreshState, Sampler, UiEvent};
pub use snapshot::{assemble, FetchError, MempoolSnapshot, TxEntry};
pub use source::{DecodedTx, Dialer, MempoolClient, TxDecoder};
