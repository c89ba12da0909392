//! Resolve operator identity and stake at a reference block.
//!
//! A [Registry] provides a read-only view of the operator set at a given block and computes the
//! index arrays the on-chain verifier uses to look up historical state. Block-keyed state never
//! changes, so implementations are free to cache (see [Cached]).
//!
//! An [AvsReader] resolves the block at which an operator-set update was recorded.

use crate::types::{
    BlockNumber, IndexBundle, OperatorAvsState, OperatorId, QuorumAvsState, QuorumNumber,
};
use std::{collections::BTreeMap, future::Future};
use thiserror::Error;

mod cached;
pub use cached::Cached;
mod fixed;
pub use fixed::Fixed;

/// Errors that can occur when reading the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("chain read failed: {0}")]
    Unavailable(String),
    #[error("operator {0} has no public key")]
    MissingPublicKey(OperatorId),
    #[error("operator {0} has no stake in the requested quorums")]
    NoStake(OperatorId),
    #[error("quorum {0} missing from snapshot")]
    MissingQuorum(QuorumNumber),
    #[error("non-signers not sorted")]
    UnsortedNonSigners,
}

/// Read-only view of the operator set.
pub trait Registry: Clone + Send + Sync + 'static {
    /// Returns every operator opted into at least one of `quorums` at `block`.
    ///
    /// Each returned operator has positive stake in at least one of `quorums`.
    fn operators_at(
        &self,
        quorums: &[QuorumNumber],
        block: BlockNumber,
    ) -> impl Future<Output = Result<BTreeMap<OperatorId, OperatorAvsState>, Error>> + Send;

    /// Returns the total stake and aggregate G1 key of each of `quorums` at `block`.
    fn quorums_at(
        &self,
        quorums: &[QuorumNumber],
        block: BlockNumber,
    ) -> impl Future<Output = Result<BTreeMap<QuorumNumber, QuorumAvsState>, Error>> + Send;

    /// Returns the indices the on-chain verifier needs to check an aggregation over `quorums`
    /// at `block` missing the signatures of `non_signers`.
    ///
    /// `non_signers` must be sorted ascending.
    fn check_signatures_indices(
        &self,
        block: BlockNumber,
        quorums: &[QuorumNumber],
        non_signers: &[OperatorId],
    ) -> impl Future<Output = Result<IndexBundle, Error>> + Send;
}

/// Reader of service-manager state that is not tied to a reference block.
pub trait AvsReader: Clone + Send + Sync + 'static {
    /// Returns the block at which the operator-set update `id` was recorded.
    fn operator_set_update_block(
        &self,
        id: u64,
    ) -> impl Future<Output = Result<BlockNumber, Error>> + Send;
}
