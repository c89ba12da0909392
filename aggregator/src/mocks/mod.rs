//! Operators and registries for testing aggregation.

use crate::{
    registry::Fixed,
    types::{operator_id, MessageDigest, OperatorAvsState, OperatorId, QuorumNumber, Stake},
    NAMESPACE,
};
use bytes::Bytes;
use commonware_codec::Encode;
use commonware_cryptography::bls12381::primitives::{
    group::{Private, G1},
    ops,
    variant::{MinPk, MinSig},
};
use rand::{rngs::StdRng, SeedableRng};
use std::collections::BTreeMap;

mod registry;
pub use registry::Registry;

/// An operator with its secret key.
pub struct Operator {
    pub private: Private,
    pub id: OperatorId,
    pub state: OperatorAvsState,
}

impl Operator {
    /// Sign `digest`.
    pub fn signature(&self, digest: &MessageDigest) -> G1 {
        ops::sign_message::<MinSig>(&self.private, Some(NAMESPACE), digest.as_slice())
    }

    /// Sign `digest` and encode the signature as it arrives over the wire.
    pub fn sign(&self, digest: &MessageDigest) -> Bytes {
        Bytes::copy_from_slice(&self.signature(digest).encode())
    }
}

/// Generate one operator per `(quorum, stake)` entry.
pub fn operators(seed: u64, stakes: &[(QuorumNumber, u64)]) -> Vec<Operator> {
    let mut rng = StdRng::seed_from_u64(seed);
    stakes
        .iter()
        .map(|(quorum, stake)| {
            let (private, pubkey_g2) = ops::keypair::<_, MinSig>(&mut rng);
            let pubkey_g1 = ops::compute_public::<MinPk>(&private);
            Operator {
                private,
                id: operator_id(&pubkey_g1),
                state: OperatorAvsState {
                    pubkey_g1,
                    pubkey_g2,
                    stake_per_quorum: BTreeMap::from([(*quorum, Stake::from(*stake))]),
                },
            }
        })
        .collect()
}

/// A [Fixed] registry over `operators`.
pub fn fixed(operators: &[Operator]) -> Fixed {
    Fixed::new(operators.iter().map(|o| (o.id, o.state.clone())))
}
