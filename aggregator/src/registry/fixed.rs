use super::{AvsReader, Error, Registry};
use crate::types::{
    BlockNumber, IndexBundle, OperatorAvsState, OperatorId, QuorumAvsState, QuorumNumber, Stake,
};
use commonware_cryptography::bls12381::primitives::group::{Element, G1, G2};
use std::{collections::BTreeMap, sync::Arc};

/// A [Registry] whose operator set is the same at every block.
///
/// Index arrays are zeroed (there is no history to look up) but shaped exactly as the on-chain
/// verifier expects them.
#[derive(Clone, Default)]
pub struct Fixed {
    operators: Arc<BTreeMap<OperatorId, OperatorAvsState>>,
    operator_set_updates: Arc<BTreeMap<u64, BlockNumber>>,
}

impl Fixed {
    /// Create a registry over the provided operators.
    pub fn new(operators: impl IntoIterator<Item = (OperatorId, OperatorAvsState)>) -> Self {
        Self {
            operators: Arc::new(operators.into_iter().collect()),
            operator_set_updates: Arc::default(),
        }
    }

    /// Record the blocks at which operator-set updates were recorded.
    pub fn with_operator_set_updates(
        mut self,
        updates: impl IntoIterator<Item = (u64, BlockNumber)>,
    ) -> Self {
        self.operator_set_updates = Arc::new(updates.into_iter().collect());
        self
    }

    /// Returns the positive stake `state` holds in each of `quorums`.
    fn stake_in(
        state: &OperatorAvsState,
        quorums: &[QuorumNumber],
    ) -> BTreeMap<QuorumNumber, Stake> {
        quorums
            .iter()
            .filter_map(|q| {
                let stake = state.stake_per_quorum.get(q)?;
                (*stake > Stake::default()).then(|| (*q, stake.clone()))
            })
            .collect()
    }
}

impl Registry for Fixed {
    async fn operators_at(
        &self,
        quorums: &[QuorumNumber],
        _: BlockNumber,
    ) -> Result<BTreeMap<OperatorId, OperatorAvsState>, Error> {
        let mut snapshot = BTreeMap::new();
        for (id, state) in self.operators.iter() {
            let stake_per_quorum = Self::stake_in(state, quorums);
            if stake_per_quorum.is_empty() {
                continue;
            }
            if state.pubkey_g2 == G2::zero() {
                return Err(Error::MissingPublicKey(*id));
            }
            snapshot.insert(
                *id,
                OperatorAvsState {
                    pubkey_g1: state.pubkey_g1,
                    pubkey_g2: state.pubkey_g2,
                    stake_per_quorum,
                },
            );
        }
        Ok(snapshot)
    }

    async fn quorums_at(
        &self,
        quorums: &[QuorumNumber],
        _: BlockNumber,
    ) -> Result<BTreeMap<QuorumNumber, QuorumAvsState>, Error> {
        let mut snapshot = BTreeMap::new();
        for quorum in quorums {
            let mut total_stake = Stake::default();
            let mut aggregate_pubkey_g1 = G1::zero();
            for state in self.operators.values() {
                let Some(stake) = state.stake_per_quorum.get(quorum) else {
                    continue;
                };
                if *stake == Stake::default() {
                    continue;
                }
                total_stake += stake;
                aggregate_pubkey_g1.add(&state.pubkey_g1);
            }
            snapshot.insert(
                *quorum,
                QuorumAvsState {
                    total_stake,
                    aggregate_pubkey_g1,
                },
            );
        }
        Ok(snapshot)
    }

    async fn check_signatures_indices(
        &self,
        _: BlockNumber,
        quorums: &[QuorumNumber],
        non_signers: &[OperatorId],
    ) -> Result<IndexBundle, Error> {
        if !non_signers.windows(2).all(|w| w[0] < w[1]) {
            return Err(Error::UnsortedNonSigners);
        }
        let non_signer_stake_indices = quorums
            .iter()
            .map(|quorum| {
                let opted_in = non_signers
                    .iter()
                    .filter(|id| {
                        self.operators
                            .get(*id)
                            .and_then(|state| state.stake_per_quorum.get(quorum))
                            .is_some_and(|stake| *stake > Stake::default())
                    })
                    .count();
                vec![0; opted_in]
            })
            .collect();
        Ok(IndexBundle {
            non_signer_quorum_bitmap_indices: vec![0; non_signers.len()],
            quorum_apk_indices: vec![0; quorums.len()],
            total_stake_indices: vec![0; quorums.len()],
            non_signer_stake_indices,
        })
    }
}

impl AvsReader for Fixed {
    async fn operator_set_update_block(&self, id: u64) -> Result<BlockNumber, Error> {
        self.operator_set_updates
            .get(&id)
            .copied()
            .ok_or_else(|| Error::Unavailable(format!("unknown operator set update: {id}")))
    }
}
