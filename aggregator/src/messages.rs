//! Messages operators attest to.
//!
//! Each message is ABI-encoded exactly as the on-chain verifier encodes it and its digest is the
//! keccak-256 of that encoding.

use crate::types::{MessageDigest, OperatorId, TaskIndex};
use alloy_primitives::keccak256;
use alloy_sol_types::{sol, SolValue};
use bytes::Bytes;

sol! {
    /// Response to a checkpoint task, committing to the updates observed over a time window.
    #[derive(Debug, PartialEq, Eq)]
    struct CheckpointTaskResponse {
        uint32 referenceTaskIndex;
        uint64 fromTimestamp;
        uint64 toTimestamp;
        bytes32 stateRootUpdatesRoot;
        bytes32 operatorSetUpdatesRoot;
    }

    /// A rollup state root, with the data-availability reference it was posted under.
    #[derive(Debug, PartialEq, Eq)]
    struct StateRootUpdateMessage {
        uint32 rollupId;
        uint64 blockHeight;
        uint64 timestamp;
        bytes32 nearDaTransactionId;
        bytes32 nearDaCommitment;
        bytes32 stateRoot;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Operator {
        bytes pubkey;
        uint128 weight;
    }

    /// A change of the operator set mirrored to other chains.
    #[derive(Debug, PartialEq, Eq)]
    struct OperatorSetUpdateMessage {
        uint64 id;
        uint64 timestamp;
        Operator[] operators;
    }
}

/// A message with a canonical digest.
pub trait Signable {
    /// Returns the keccak-256 of the message's ABI encoding.
    fn digest(&self) -> MessageDigest;
}

impl Signable for CheckpointTaskResponse {
    fn digest(&self) -> MessageDigest {
        keccak256(self.abi_encode())
    }
}

impl Signable for StateRootUpdateMessage {
    fn digest(&self) -> MessageDigest {
        keccak256(self.abi_encode())
    }
}

impl Signable for OperatorSetUpdateMessage {
    fn digest(&self) -> MessageDigest {
        keccak256(self.abi_encode())
    }
}

impl CheckpointTaskResponse {
    pub fn task_index(&self) -> TaskIndex {
        self.referenceTaskIndex
    }
}

/// A signed [CheckpointTaskResponse].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedCheckpointTaskResponse {
    pub task_response: CheckpointTaskResponse,
    pub signature: Bytes,
    pub operator_id: OperatorId,
}

/// A signed [StateRootUpdateMessage].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedStateRootUpdateMessage {
    pub message: StateRootUpdateMessage,
    pub signature: Bytes,
    pub operator_id: OperatorId,
}

/// A signed [OperatorSetUpdateMessage].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedOperatorSetUpdateMessage {
    pub message: OperatorSetUpdateMessage,
    pub signature: Bytes,
    pub operator_id: OperatorId,
}
