use crate::types::{
    OperatorAvsState, OperatorId, QuorumNumber, Stake, ThresholdPercentage,
};
use commonware_cryptography::bls12381::primitives::group::{Element, G1, G2};
use std::collections::{BTreeMap, BTreeSet};

/// Returns whether `signed` covers at least `percentage` percent of `total`.
///
/// A quorum without stake is only met by a zero threshold.
pub fn threshold_met(signed: &Stake, total: &Stake, percentage: ThresholdPercentage) -> bool {
    if *total == Stake::default() {
        return percentage == 0;
    }
    signed * 100u32 >= total * u32::from(percentage)
}

/// Signatures accumulated so far for one digest.
pub struct Partial {
    quorums: Vec<QuorumNumber>,
    thresholds: Vec<ThresholdPercentage>,

    signers: BTreeSet<OperatorId>,
    signers_apk_g2: G2,
    signers_agg_sig_g1: G1,
    signed_stake_per_quorum: BTreeMap<QuorumNumber, Stake>,
}

impl Partial {
    pub fn new(quorums: Vec<QuorumNumber>, thresholds: Vec<ThresholdPercentage>) -> Self {
        Self {
            quorums,
            thresholds,
            signers: BTreeSet::new(),
            signers_apk_g2: G2::zero(),
            signers_agg_sig_g1: G1::zero(),
            signed_stake_per_quorum: BTreeMap::new(),
        }
    }

    /// Merge a verified signature from `operator`.
    ///
    /// Returns false (and changes nothing) if `operator` already signed.
    pub fn add(&mut self, operator: OperatorId, state: &OperatorAvsState, signature: &G1) -> bool {
        if !self.signers.insert(operator) {
            return false;
        }
        self.signers_apk_g2.add(&state.pubkey_g2);
        self.signers_agg_sig_g1.add(signature);
        for quorum in &self.quorums {
            let Some(stake) = state.stake_per_quorum.get(quorum) else {
                continue;
            };
            *self.signed_stake_per_quorum.entry(*quorum).or_default() += stake;
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        self.signers.is_empty()
    }

    /// Returns whether every requested quorum has crossed its threshold.
    ///
    /// `totals` follows the requested quorum order.
    pub fn ready(&self, totals: &[Stake]) -> bool {
        let zero = Stake::default();
        self.quorums
            .iter()
            .zip(&self.thresholds)
            .zip(totals)
            .all(|((quorum, threshold), total)| {
                let signed = self.signed_stake_per_quorum.get(quorum).unwrap_or(&zero);
                threshold_met(signed, total, *threshold)
            })
    }

    /// Returns the operators of `snapshot` that have not signed, ascending by id.
    pub fn non_signers<'a>(
        &self,
        snapshot: &'a BTreeMap<OperatorId, OperatorAvsState>,
    ) -> Vec<(OperatorId, &'a OperatorAvsState)> {
        snapshot
            .iter()
            .filter(|(id, _)| !self.signers.contains(*id))
            .map(|(id, state)| (*id, state))
            .collect()
    }

    /// Signed stake of each requested quorum, in request order.
    pub fn signed_stake(&self) -> Vec<Stake> {
        self.quorums
            .iter()
            .map(|q| self.signed_stake_per_quorum.get(q).cloned().unwrap_or_default())
            .collect()
    }

    pub fn signers(&self) -> &BTreeSet<OperatorId> {
        &self.signers
    }

    pub fn signers_apk_g2(&self) -> G2 {
        self.signers_apk_g2
    }

    pub fn signers_agg_sig_g1(&self) -> G1 {
        self.signers_agg_sig_g1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks;
    use alloy_primitives::B256;

    #[test]
    fn test_threshold_exact() {
        let total = Stake::from(100u32);
        assert!(!threshold_met(&Stake::from(66u32), &total, 67));
        assert!(threshold_met(&Stake::from(67u32), &total, 67));

        // 2 * 100 >= 3 * 67 is false, 3 * 100 >= 3 * 100 is true
        let total = Stake::from(3u32);
        assert!(!threshold_met(&Stake::from(2u32), &total, 67));
        assert!(threshold_met(&Stake::from(2u32), &total, 66));
        assert!(threshold_met(&Stake::from(3u32), &total, 100));
    }

    #[test]
    fn test_threshold_zero_total() {
        let zero = Stake::default();
        assert!(threshold_met(&zero, &zero, 0));
        assert!(!threshold_met(&zero, &zero, 1));
        assert!(!threshold_met(&zero, &zero, 100));
    }

    #[test]
    fn test_threshold_beyond_u128() {
        let total = Stake::from(u128::MAX) * 1000u32;
        let half = &total / 2u32;
        assert!(threshold_met(&half, &total, 50));
        assert!(!threshold_met(&(&half - 1u32), &total, 50));
        assert!(!threshold_met(&half, &total, 51));
    }

    #[test]
    fn test_duplicate_ignored() {
        let operators = mocks::operators(0, &[(0, 40), (0, 60)]);
        let digest = B256::repeat_byte(1);
        let mut partial = Partial::new(vec![0], vec![100]);
        let signature = operators[0].signature(&digest);

        assert!(partial.add(operators[0].id, &operators[0].state, &signature));
        let apk = partial.signers_apk_g2();
        let sig = partial.signers_agg_sig_g1();
        assert!(!partial.add(operators[0].id, &operators[0].state, &signature));
        assert_eq!(partial.signers().len(), 1);
        assert_eq!(partial.signers_apk_g2(), apk);
        assert_eq!(partial.signers_agg_sig_g1(), sig);
        assert_eq!(partial.signed_stake(), vec![Stake::from(40u32)]);
    }

    #[test]
    fn test_ready_requires_every_quorum() {
        let operators = mocks::operators(1, &[(0, 10), (1, 10)]);
        let digest = B256::repeat_byte(2);
        let totals = vec![Stake::from(10u32), Stake::from(10u32)];
        let mut partial = Partial::new(vec![0, 1], vec![50, 50]);
        assert!(!partial.ready(&totals));

        partial.add(
            operators[0].id,
            &operators[0].state,
            &operators[0].signature(&digest),
        );
        assert!(!partial.ready(&totals));
        partial.add(
            operators[1].id,
            &operators[1].state,
            &operators[1].signature(&digest),
        );
        assert!(partial.ready(&totals));
        assert_eq!(
            partial.signed_stake(),
            vec![Stake::from(10u32), Stake::from(10u32)]
        );
    }

    #[test]
    fn test_unrequested_quorum_stake_ignored() {
        let operators = mocks::operators(2, &[(0, 10)]);
        let mut state = operators[0].state.clone();
        state.stake_per_quorum.insert(9, Stake::from(1000u32));
        let mut partial = Partial::new(vec![0], vec![100]);
        partial.add(
            operators[0].id,
            &state,
            &operators[0].signature(&B256::ZERO),
        );
        assert_eq!(partial.signed_stake(), vec![Stake::from(10u32)]);
    }

    #[test]
    fn test_non_signers_ascending() {
        let operators = mocks::operators(3, &[(0, 1), (0, 1), (0, 1), (0, 1), (0, 1)]);
        let snapshot: BTreeMap<_, _> = operators
            .iter()
            .map(|o| (o.id, o.state.clone()))
            .collect();
        let mut partial = Partial::new(vec![0], vec![100]);
        partial.add(
            operators[2].id,
            &operators[2].state,
            &operators[2].signature(&B256::ZERO),
        );

        let non_signers = partial.non_signers(&snapshot);
        assert_eq!(non_signers.len(), 4);
        assert!(non_signers.windows(2).all(|w| w[0].0 < w[1].0));
        assert!(non_signers.iter().all(|(id, _)| *id != operators[2].id));
    }
}
