//! Cardano node adapter
//!
//! Implements the node and decoder interfaces on top of pallas: a node-to-client
//! session running the local tx monitor protocol, and a multi-era transaction decoder.

use async_trait::async_trait;
use pallas_addresses::{Address, StakeAddress};
use pallas_network::facades::NodeClient;
use pallas_network::miniprotocols::handshake::{n2c::VersionTable, Confirmation};
use pallas_network::multiplexer::Bearer;
use pallas_primitives::{alonzo, conway};
use pallas_traverse::{Era, MultiEraCert, MultiEraTx};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::config::Target;
use crate::source::{
    Certificate, DecodeError, DecodedTx, DialError, Dialer, MempoolClient, MempoolSizes, SourceError,
    TxDecoder, TxOutput, TxType,
};

/// Eras tried by type detection, newest first
const ERAS: [Era; 7] = [
    Era::Conway,
    Era::Babbage,
    Era::Alonzo,
    Era::Mary,
    Era::Allegra,
    Era::Shelley,
    Era::Byron,
];

fn era_id(era: Era) -> u16 {
    match era {
        Era::Byron => 0,
        Era::Shelley => 1,
        Era::Allegra => 2,
        Era::Mary => 3,
        Era::Alonzo => 4,
        Era::Babbage => 5,
        Era::Conway => 6,
        #[allow(unreachable_patterns)]
        _ => u16::MAX,
    }
}

fn era_from_id(id: u16) -> Option<Era> {
    ERAS.into_iter().find(|era| era_id(*era) == id)
}

// ==================== Transport ====================

/// Dials nodes over node-to-client mini-protocols
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeDialer;

#[async_trait]
impl Dialer for NodeDialer {
    type Client = NodeSession;

    async fn dial(
        &self,
        target: &Target,
        network_magic: u32,
        errors: UnboundedSender<SourceError>,
    ) -> Result<NodeSession, DialError> {
        let magic = u64::from(network_magic);
        let client = match target {
            Target::Unix(path) => NodeClient::connect(path, magic)
                .await
                .map_err(|e| DialError::Unix(e.to_string()))?,
            Target::Tcp { host, port } => {
                let bearer = Bearer::connect_tcp((host.as_str(), *port))
                    .await
                    .map_err(|e| DialError::Tcp(e.to_string()))?;
                let mut client = NodeClient::new(bearer);
                let confirmation = client
                    .handshake()
                    .handshake(VersionTable::v10_and_above(magic))
                    .await
                    .map_err(|e| DialError::Handshake(e.to_string()))?;
                if let Confirmation::Rejected(reason) = confirmation {
                    return Err(DialError::Handshake(format!("{:?}", reason)));
                }
                client
            }
        };
        debug!("handshake with {} complete", target);

        Ok(NodeSession {
            client,
            acquired: false,
            errors,
        })
    }
}

/// A node session positioned on the local tx monitor protocol
pub struct NodeSession {
    client: NodeClient,
    acquired: bool,
    errors: UnboundedSender<SourceError>,
}

impl NodeSession {
    async fn ensure_acquired(&mut self) -> Result<(), SourceError> {
        if !self.acquired {
            let slot = self
                .client
                .monitor()
                .acquire()
                .await
                .map_err(|e| SourceError::Protocol(e.to_string()))?;
            debug!("acquired mempool snapshot at slot {}", slot);
            self.acquired = true;
        }
        Ok(())
    }

    /// Release the current snapshot. Failures here happen outside any caller's
    /// request and are reported on the async error channel.
    async fn release(&mut self) {
        self.acquired = false;
        if let Err(e) = self.client.monitor().release().await {
            warn!("failed to release mempool snapshot: {}", e);
            let _ = self.errors.send(SourceError::Protocol(e.to_string()));
        }
    }
}

#[async_trait]
impl MempoolClient for NodeSession {
    async fn get_sizes(&mut self) -> Result<MempoolSizes, SourceError> {
        self.ensure_acquired().await?;
        let sizes = self
            .client
            .monitor()
            .query_size_and_capacity()
            .await
            .map_err(|e| SourceError::Protocol(e.to_string()))?;
        Ok(MempoolSizes {
            capacity_bytes: u64::from(sizes.capacity_in_bytes),
            size_bytes: u64::from(sizes.size_in_bytes),
            tx_count: u64::from(sizes.number_of_txs),
        })
    }

    async fn next_tx(&mut self) -> Result<Option<Vec<u8>>, SourceError> {
        self.ensure_acquired().await?;
        let next = self
            .client
            .monitor()
            .query_next_tx()
            .await
            .map_err(|e| SourceError::Protocol(e.to_string()))?;
        match next {
            Some(tx) => Ok(Some(tx.1.to_vec())),
            None => {
                self.release().await;
                Ok(None)
            }
        }
    }
}

// ==================== Decoding ====================

/// Multi-era transaction decoder
#[derive(Debug, Default, Clone, Copy)]
pub struct PallasDecoder;

fn alonzo_certificate(cert: &alonzo::Certificate) -> Certificate {
    use alonzo::Certificate as C;
    match cert {
        C::StakeRegistration { .. } => Certificate::StakeRegistration,
        C::StakeDeregistration { .. } => Certificate::StakeDeregistration,
        C::StakeDelegation { .. } => Certificate::StakeDelegation,
        C::PoolRegistration { .. } => Certificate::PoolRegistration,
        C::PoolRetirement { .. } => Certificate::PoolRetirement,
        C::GenesisKeyDelegation { .. } => Certificate::GenesisKeyDelegation,
        C::MoveInstantaneousRewardsCert { .. } => Certificate::MoveInstantaneousRewards,
    }
}

fn conway_certificate(cert: &conway::Certificate) -> Certificate {
    use conway::Certificate as C;
    match cert {
        C::StakeRegistration { .. } => Certificate::StakeRegistration,
        C::StakeDeregistration { .. } => Certificate::StakeDeregistration,
        C::StakeDelegation { .. } => Certificate::StakeDelegation,
        C::PoolRegistration { .. } => Certificate::PoolRegistration,
        C::PoolRetirement { .. } => Certificate::PoolRetirement,
        C::Reg { .. } => Certificate::Registration,
        C::UnReg { .. } => Certificate::Unregistration,
        C::VoteDeleg { .. } => Certificate::VoteDelegation,
        C::StakeVoteDeleg { .. } => Certificate::StakeVoteDelegation,
        C::StakeRegDeleg { .. } => Certificate::StakeRegistrationDelegation,
        C::VoteRegDeleg { .. } => Certificate::VoteRegistrationDelegation,
        C::StakeVoteRegDeleg { .. } => Certificate::StakeVoteRegistrationDelegation,
        C::AuthCommitteeHot { .. } => Certificate::AuthCommitteeHot,
        C::ResignCommitteeCold { .. } => Certificate::ResignCommitteeCold,
        C::RegDRepCert { .. } => Certificate::RegDrep,
        C::UnRegDRepCert { .. } => Certificate::UnregDrep,
        C::UpdateDRepCert { .. } => Certificate::UpdateDrep,
    }
}

fn certificate(cert: &MultiEraCert) -> Option<Certificate> {
    cert.as_conway()
        .map(conway_certificate)
        .or_else(|| cert.as_alonzo().map(alonzo_certificate))
}

fn output(address: Address) -> TxOutput {
    let stake_address = match &address {
        Address::Shelley(shelley) => StakeAddress::try_from(shelley.clone())
            .ok()
            .and_then(|stake| stake.to_bech32().ok()),
        _ => None,
    };
    TxOutput {
        address: address.to_string(),
        stake_address,
    }
}

impl TxDecoder for PallasDecoder {
    fn detect_type(&self, raw: &[u8]) -> Result<TxType, DecodeError> {
        ERAS.into_iter()
            .find(|era| MultiEraTx::decode_for_era(*era, raw).is_ok())
            .map(|era| TxType(era_id(era)))
            .ok_or_else(|| {
                DecodeError::UnknownType(format!(
                    "no era matches leading bytes {:02x?}",
                    &raw[..raw.len().min(4)]
                ))
            })
    }

    fn decode(&self, tx_type: TxType, raw: &[u8]) -> Result<DecodedTx, DecodeError> {
        let era = era_from_id(tx_type.0)
            .ok_or_else(|| DecodeError::UnknownType(format!("era {}", tx_type.0)))?;
        let tx = MultiEraTx::decode_for_era(era, raw).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let metadata = match tx.metadata().as_alonzo() {
            Some(meta) => Some(
                pallas_codec::minicbor::to_vec(meta).map_err(|e| DecodeError::Malformed(e.to_string()))?,
            ),
            None => None,
        };

        let outputs = tx
            .outputs()
            .iter()
            .filter_map(|out| out.address().ok())
            .map(output)
            .collect();

        let certificates = tx.certs().iter().filter_map(certificate).collect();

        Ok(DecodedTx {
            hash: tx.hash().to_string(),
            metadata,
            outputs,
            certificates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_era_ids_round_trip() {
        for era in ERAS {
            assert_eq!(era_from_id(era_id(era)), Some(era));
        }
        assert_eq!(era_from_id(99), None);
    }

    #[test]
    fn test_detect_type_rejects_garbage() {
        let decoder = PallasDecoder;
        assert!(matches!(
            decoder.detect_type(&[0xff, 0x00, 0x01]),
            Err(DecodeError::UnknownType(_))
        ));
    }

    #[test]
    fn test_decode_unknown_era() {
        let decoder = PallasDecoder;
        assert!(matches!(
            decoder.decode(TxType(42), &[0x80]),
            Err(DecodeError::UnknownType(_))
        ));
    }
}
