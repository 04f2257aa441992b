//! Node and Transaction Collaborators
//!
//! The wire protocol client and the transaction decoder live outside this crate.
//! This module defines the interface the pipeline needs from each of them.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::config::Target;

/// Errors raised while dialing a node
#[derive(Error, Debug)]
pub enum DialError {
    #[error("node socket path does not exist: {0}")]
    SocketNotFound(String),

    #[error("failure connecting to node via UNIX socket: {0}")]
    Unix(String),

    #[error("failure connecting to node via TCP: {0}")]
    Tcp(String),

    #[error("handshake failed: {0}")]
    Handshake(String),
}

/// Errors raised by an established node session
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("connection closed")]
    Closed,
}

/// Errors raised by the transaction decoder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown transaction type: {0}")]
    UnknownType(String),

    #[error("malformed transaction: {0}")]
    Malformed(String),
}

/// Aggregate mempool figures reported by the node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MempoolSizes {
    pub capacity_bytes: u64,
    pub size_bytes: u64,
    pub tx_count: u64,
}

/// Era or encoding a raw transaction belongs to, as reported by the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxType(pub u16);

/// On-chain certificate kinds a transaction may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Certificate {
    StakeRegistration,
    StakeDeregistration,
    StakeDelegation,
    PoolRegistration,
    PoolRetirement,
    GenesisKeyDelegation,
    MoveInstantaneousRewards,
    Registration,
    Unregistration,
    VoteDelegation,
    StakeVoteDelegation,
    StakeRegistrationDelegation,
    VoteRegistrationDelegation,
    StakeVoteRegistrationDelegation,
    AuthCommitteeHot,
    ResignCommitteeCold,
    RegDrep,
    UnregDrep,
    UpdateDrep,
}

/// A transaction output as seen by the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    /// Bech32 payment address
    pub address: String,
    /// Bech32 stake address, when the address carries a delegation part
    pub stake_address: Option<String>,
}

impl TxOutput {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            stake_address: None,
        }
    }

    pub fn with_stake(address: impl Into<String>, stake_address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            stake_address: Some(stake_address.into()),
        }
    }
}

/// The fields of a decoded transaction that the pipeline uses
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedTx {
    /// Transaction hash, hex encoded
    pub hash: String,
    /// CBOR encoded auxiliary metadata, if present
    pub metadata: Option<Vec<u8>>,
    pub outputs: Vec<TxOutput>,
    pub certificates: Vec<Certificate>,
}

/// A live session with a node's mempool monitor
#[async_trait]
pub trait MempoolClient: Send {
    /// Capacity, used bytes and transaction count of the current snapshot
    async fn get_sizes(&mut self) -> Result<MempoolSizes, SourceError>;

    /// Next raw transaction of the current snapshot.
    ///
    /// Returns `None` exactly once the snapshot is exhausted; the following call
    /// starts a fresh snapshot.
    async fn next_tx(&mut self) -> Result<Option<Vec<u8>>, SourceError>;
}

/// Establishes node sessions
#[async_trait]
pub trait Dialer: Send + Sync {
    type Client: MempoolClient;

    /// Dial `target` using `network_magic` for the handshake.
    ///
    /// Errors the session reports after the dial completes are sent on `errors`.
    async fn dial(
        &self,
        target: &Target,
        network_magic: u32,
        errors: UnboundedSender<SourceError>,
    ) -> Result<Self::Client, DialError>;
}

/// Turns raw transaction bytes into structured fields
#[cfg_attr(test, mockall::automock)]
pub trait TxDecoder: Send + Sync {
    fn detect_type(&self, raw: &[u8]) -> Result<TxType, DecodeError>;

    fn decode(&self, tx_type: TxType, raw: &[u8]) -> Result<DecodedTx, DecodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tx_output_constructors() {
        let plain = TxOutput::new("addr1");
        assert_eq!(plain.stake_address, None);

        let staked = TxOutput::with_stake("addr1", "stake1");
        assert_eq!(staked.stake_address.as_deref(), Some("stake1"));
    }

    #[test]
    fn test_dial_error_display() {
        let err = DialError::SocketNotFound("/tmp/node.socket".to_string());
        assert_eq!(err.to_string(), "node socket path does not exist: /tmp/node.socket");

        let err = DialError::Tcp("connection refused".to_string());
        assert!(err.to_string().contains("via TCP"));
    }

    #[test]
    fn test_mock_decoder_is_usable() {
        let mut decoder = MockTxDecoder::new();
        decoder
            .expect_detect_type()
            .returning(|_| Err(DecodeError::UnknownType("0xff".to_string())));
        assert!(decoder.detect_type(&[0xff]).is_err());
    }
}
