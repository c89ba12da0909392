//! Types shared by the registry, the aggregators and the supervisor.

use crate::Error;
use alloy_primitives::{keccak256, B256};
use commonware_codec::Encode;
use commonware_cryptography::bls12381::primitives::group::{G1, G2};
use num_bigint::BigUint;
use std::{
    collections::{BTreeMap, BTreeSet},
    time::Duration,
};

/// Identifier of an operator, derived from its G1 public key.
///
/// Ids compare byte-wise, which is the same as comparing their big-endian numeric value.
pub type OperatorId = B256;

/// Keccak-256 of the canonical encoding of the message being aggregated.
pub type MessageDigest = B256;

/// Tag of a quorum.
pub type QuorumNumber = u8;

/// Minimum percentage (of total quorum stake) that signers must cover.
pub type ThresholdPercentage = u8;

/// Block height used as the reference snapshot for operator state.
pub type BlockNumber = u32;

/// Index of a checkpoint task.
pub type TaskIndex = u32;

/// Arbitrary-precision stake.
pub type Stake = BigUint;

/// Derive the [OperatorId] of an operator from its G1 public key.
pub fn operator_id(pubkey_g1: &G1) -> OperatorId {
    keccak256(pubkey_g1.encode())
}

/// State of an operator at a reference block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorAvsState {
    pub pubkey_g1: G1,
    pub pubkey_g2: G2,

    /// Stake per quorum. A quorum is present iff the operator is opted into it.
    pub stake_per_quorum: BTreeMap<QuorumNumber, Stake>,
}

/// State of a quorum at a reference block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuorumAvsState {
    /// Sum of the stake of all operators opted into the quorum.
    pub total_stake: Stake,

    /// Sum of the G1 public keys of all operators opted into the quorum.
    pub aggregate_pubkey_g1: G1,
}

/// Indices the on-chain verifier uses to look up historical registry state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IndexBundle {
    pub non_signer_quorum_bitmap_indices: Vec<u32>,
    pub quorum_apk_indices: Vec<u32>,
    pub total_stake_indices: Vec<u32>,
    pub non_signer_stake_indices: Vec<Vec<u32>>,
}

/// Parameters of a message aggregation.
#[derive(Clone, Debug)]
pub struct Params {
    pub digest: MessageDigest,

    /// Quorums that must each cross their threshold. Results follow this order.
    pub quorum_numbers: Vec<QuorumNumber>,

    /// Threshold for each entry of `quorum_numbers`.
    pub quorum_threshold_percentages: Vec<ThresholdPercentage>,

    /// Block whose operator set defines membership and stake.
    pub reference_block: BlockNumber,

    /// Time after which the aggregation expires.
    pub time_to_expiry: Duration,

    /// If set, the aggregation must complete within this window of the first accepted signature
    /// (and never later than `time_to_expiry`).
    pub aggregation_timeout: Option<Duration>,
}

impl Params {
    /// Ensure the quorum parameters are well-formed.
    pub fn validate(&self) -> Result<(), Error> {
        validate_quorums(&self.quorum_numbers, &self.quorum_threshold_percentages)
    }
}

/// Ensure `quorums` is non-empty and distinct and each has a threshold between 1 and 100.
pub fn validate_quorums(
    quorums: &[QuorumNumber],
    thresholds: &[ThresholdPercentage],
) -> Result<(), Error> {
    if quorums.is_empty() {
        return Err(Error::InvalidQuorumParameters("no quorums"));
    }
    if quorums.len() != thresholds.len() {
        return Err(Error::InvalidQuorumParameters(
            "quorums and thresholds differ in length",
        ));
    }
    let distinct: BTreeSet<_> = quorums.iter().collect();
    if distinct.len() != quorums.len() {
        return Err(Error::InvalidQuorumParameters("duplicate quorum"));
    }
    if thresholds.iter().any(|p| *p == 0 || *p > 100) {
        return Err(Error::InvalidQuorumParameters(
            "threshold must be between 1 and 100",
        ));
    }
    Ok(())
}

/// A completed aggregation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Aggregation {
    pub digest: MessageDigest,

    /// Reference block the operator set was read at.
    pub eth_block_number: BlockNumber,

    /// Operators whose signatures were aggregated.
    pub signers: BTreeSet<OperatorId>,

    /// G1 keys of opted-in operators that did not sign, ascending by operator id.
    pub non_signer_pubkeys_g1: Vec<G1>,

    /// Aggregate G1 key of each requested quorum, in request order.
    pub quorum_apks_g1: Vec<G1>,

    pub signers_apk_g2: G2,
    pub signers_agg_sig_g1: G1,

    /// Signed stake of each requested quorum, in request order.
    pub signed_stake_per_quorum: Vec<Stake>,

    /// Total stake of each requested quorum, in request order.
    pub total_stake_per_quorum: Vec<Stake>,

    pub non_signer_quorum_bitmap_indices: Vec<u32>,
    pub quorum_apk_indices: Vec<u32>,
    pub total_stake_indices: Vec<u32>,
    pub non_signer_stake_indices: Vec<Vec<u32>>,
}

/// Terminal result of an aggregator.
#[derive(Debug)]
pub struct AggregationResult {
    pub digest: MessageDigest,
    pub outcome: Result<Aggregation, Error>,
}
