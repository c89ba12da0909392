//! Aggregate stake-weighted BLS attestations over operator-signed messages.
//!
//! # Overview
//!
//! Registered operators sign messages (checkpoint task responses, cross-chain state-root updates,
//! operator-set updates) with BLS keys. This crate collects those signatures and, once every
//! requested quorum has crossed its stake threshold, emits a single [types::Aggregation] that an
//! on-chain verifier can check with one pairing.
//!
//! # Architecture
//!
//! - [registry]: resolves operator keys and stake at a reference block and computes the indices
//!   the on-chain verifier uses to look up historical state.
//! - [aggregator]: one actor per message digest. It snapshots the operator set, verifies incoming
//!   signatures, accumulates signers and stake, and emits exactly one result (success, expiry or
//!   failure) before exiting.
//! - [supervisor]: owns the map of live aggregators, creates them on demand, routes signatures to
//!   them, and multiplexes their results onto a single stream.
//! - [handler]: the surface used by the RPC server and the chain observer. It derives digests from
//!   signed messages and applies the configured default quorums and timeouts.
//!
//! # Status
//!
//! `finality-aggregator` is **ALPHA** software and is not yet recommended for production use.
//! Developers should expect breaking changes and occasional instability.

use thiserror::Error;

pub mod aggregator;
pub mod handler;
pub mod messages;
pub mod registry;
pub mod supervisor;
pub mod types;

#[cfg(test)]
pub mod mocks;

/// Namespace prepended to every digest before it is signed.
pub const NAMESPACE: &[u8] = b"_FINALITY_ATTESTATION";

/// Errors that can occur while aggregating signatures.
///
/// Errors tied to a single signature are returned to the caller that submitted it. Errors that
/// terminate an aggregator are published on the results stream.
#[derive(Error, Debug)]
pub enum Error {
    #[error("message already initialized: {0}")]
    MessageAlreadyInitialized(types::MessageDigest),
    #[error("message not found: {0}")]
    MessageNotFound(types::MessageDigest),
    #[error("operator not in quorum: {0}")]
    OperatorNotInQuorum(types::OperatorId),
    #[error("signature verification failed: {0}")]
    SignatureVerificationError(commonware_codec::Error),
    #[error("incorrect signature")]
    IncorrectSignature,
    #[error("message expired")]
    MessageExpired,
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(registry::Error),
    #[error("indices unavailable: {0}")]
    IndicesUnavailable(registry::Error),
    #[error("avs reader unavailable: {0}")]
    AvsReaderUnavailable(registry::Error),
    #[error("invalid quorum parameters: {0}")]
    InvalidQuorumParameters(&'static str),
    #[error("cancelled")]
    Cancelled,
}
