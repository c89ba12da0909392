//! Run a finality aggregator over a configured operator set.
//!
//! # Usage
//!
//! ```bash
//! cargo run --release --bin node -- --config node.yaml
//! ```
//!
//! The node loads a fixed operator set from its configuration, starts the supervisor and logs
//! every aggregation result. If a `simulation` section is present, the listed private keys sign
//! a synthetic state-root update every `interval_ms`, which exercises the full signing path
//! without an RPC server.
//!
//! # Configuration
//!
//! ```yaml
//! quorum_numbers: [0]
//! quorum_threshold_percentages: [67]
//! message_ttl_ms: 60000
//! task_aggregation_timeout_ms: 10000
//! request_timeout_ms: 5000
//! mailbox_size: 1024
//! aggregator_mailbox_size: 64
//! registry_cache_size: 16
//! operators:
//!   - public_key_g1: "0x..."
//!     public_key_g2: "0x..."
//!     stakes:
//!       0: "1000000000000000000"
//! operator_set_updates:
//!   1: 100
//! simulation:
//!   private_keys: ["0x..."]
//!   interval_ms: 1000
//!   rollup_id: 1
//! ```

use alloy_primitives::B256;
use bytes::Bytes;
use commonware_codec::{DecodeExt, Encode};
use commonware_cryptography::bls12381::primitives::{
    group::{Private, G1, G2},
    ops,
    variant::{MinPk, MinSig},
};
use commonware_runtime::Clock;
use commonware_utils::from_hex_formatted;
use finality_aggregator::{
    handler::{self, Handler},
    messages::{Signable, SignedStateRootUpdateMessage, StateRootUpdateMessage},
    registry::{AvsReader, Cached, Fixed},
    supervisor,
    types::{operator_id, validate_quorums, MessageDigest, OperatorAvsState, OperatorId, Stake},
    NAMESPACE,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    time::{Duration, UNIX_EPOCH},
};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur when loading the configuration.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("invalid key {0}: {1}")]
    Key(String, commonware_codec::Error),
    #[error("invalid stake: {0}")]
    Stake(String),
    #[error("invalid quorums: {0}")]
    Quorums(finality_aggregator::Error),
}

/// Configuration for the node.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    pub quorum_numbers: Vec<u8>,
    pub quorum_threshold_percentages: Vec<u8>,
    pub message_ttl_ms: u64,
    #[serde(default)]
    pub task_aggregation_timeout_ms: Option<u64>,
    pub request_timeout_ms: u64,
    pub mailbox_size: usize,
    pub aggregator_mailbox_size: usize,
    pub registry_cache_size: usize,
    pub operators: Vec<OperatorConfig>,
    /// Block at which each operator-set update was recorded.
    #[serde(default)]
    pub operator_set_updates: BTreeMap<u64, u32>,
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

/// A registered operator.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct OperatorConfig {
    pub public_key_g1: String,
    pub public_key_g2: String,
    /// Decimal stake per quorum.
    pub stakes: BTreeMap<u8, String>,
}

/// Local operators that sign synthetic state-root updates.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SimulationConfig {
    pub private_keys: Vec<String>,
    pub interval_ms: u64,
    pub rollup_id: u32,
}

fn decode<T: DecodeExt<()>>(hex: &str) -> Result<T, Error> {
    let bytes = from_hex_formatted(hex).ok_or_else(|| Error::Hex(hex.to_string()))?;
    T::decode(bytes.as_ref()).map_err(|err| Error::Key(hex.to_string(), err))
}

impl Config {
    /// Parse and validate a YAML configuration.
    pub fn parse(yaml: &str) -> Result<Self, Error> {
        let config: Self = serde_yaml::from_str(yaml)?;
        validate_quorums(&config.quorum_numbers, &config.quorum_threshold_percentages)
            .map_err(Error::Quorums)?;
        Ok(config)
    }

    /// Decode the configured operator set.
    pub fn operators(&self) -> Result<Vec<(OperatorId, OperatorAvsState)>, Error> {
        self.operators
            .iter()
            .map(|operator| {
                let pubkey_g1: G1 = decode(&operator.public_key_g1)?;
                let pubkey_g2: G2 = decode(&operator.public_key_g2)?;
                let stake_per_quorum = operator
                    .stakes
                    .iter()
                    .map(|(quorum, stake)| {
                        let stake = stake
                            .parse::<Stake>()
                            .map_err(|_| Error::Stake(stake.clone()))?;
                        Ok((*quorum, stake))
                    })
                    .collect::<Result<_, Error>>()?;
                Ok((
                    operator_id(&pubkey_g1),
                    OperatorAvsState {
                        pubkey_g1,
                        pubkey_g2,
                        stake_per_quorum,
                    },
                ))
            })
            .collect()
    }

    /// Build the registry (and avs reader) over the configured operator set.
    pub fn registry(&self) -> Result<Fixed, Error> {
        Ok(Fixed::new(self.operators()?)
            .with_operator_set_updates(self.operator_set_updates.clone()))
    }

    /// Decode the simulated operators, if any.
    pub fn signers(&self) -> Result<Vec<Signer>, Error> {
        let Some(simulation) = &self.simulation else {
            return Ok(Vec::new());
        };
        simulation
            .private_keys
            .iter()
            .map(|key| Ok(Signer::new(decode(key)?)))
            .collect()
    }

    pub fn supervisor_config(&self, registry: Fixed) -> supervisor::Config<Cached<Fixed>> {
        supervisor::Config {
            registry: Cached::new(registry, self.registry_cache_size),
            mailbox_size: self.mailbox_size,
            aggregator_mailbox_size: self.aggregator_mailbox_size,
            task_aggregation_timeout: self.task_aggregation_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn handler_config<A: AvsReader>(&self, avs_reader: A) -> handler::Config<A> {
        handler::Config {
            avs_reader,
            quorum_numbers: self.quorum_numbers.clone(),
            quorum_threshold_percentages: self.quorum_threshold_percentages.clone(),
            message_ttl: Duration::from_millis(self.message_ttl_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
        }
    }
}

/// A local operator.
pub struct Signer {
    private: Private,
    id: OperatorId,
}

impl Signer {
    pub fn new(private: Private) -> Self {
        let id = operator_id(&ops::compute_public::<MinPk>(&private));
        Self { private, id }
    }

    pub fn id(&self) -> OperatorId {
        self.id
    }

    /// Sign `digest`, returning the encoded signature.
    pub fn sign(&self, digest: &MessageDigest) -> Bytes {
        let signature =
            ops::sign_message::<MinSig>(&self.private, Some(NAMESPACE), digest.as_slice());
        Bytes::copy_from_slice(&signature.encode())
    }
}

/// Have `signers` sign a new state-root update for `rollup_id` every `interval`.
pub async fn simulate<E: Clock, A: AvsReader>(
    context: E,
    handler: Handler<E, A>,
    signers: Vec<Signer>,
    rollup_id: u32,
    interval: Duration,
) {
    let mut rng = StdRng::seed_from_u64(u64::from(rollup_id));
    let mut height = 0u64;
    loop {
        context.sleep(interval).await;
        height += 1;
        let timestamp = context
            .current()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        let message = StateRootUpdateMessage {
            rollupId: rollup_id,
            blockHeight: height,
            timestamp,
            nearDaTransactionId: B256::from(rng.gen::<[u8; 32]>()),
            nearDaCommitment: B256::from(rng.gen::<[u8; 32]>()),
            stateRoot: B256::from(rng.gen::<[u8; 32]>()),
        };
        let digest = message.digest();
        debug!(height, %digest, "simulating state root update");
        for signer in &signers {
            let signed = SignedStateRootUpdateMessage {
                message: message.clone(),
                signature: signer.sign(&digest),
                operator_id: signer.id(),
            };
            if let Err(err) = handler.process_signed_state_root_update(signed).await {
                warn!(height, operator = %signer.id(), ?err, "simulated signature rejected");
            }
        }
    }
}
