use super::{partial::Partial, Config, Mailbox, Message};
use crate::{
    registry::{self, Registry},
    types::{
        Aggregation, AggregationResult, OperatorAvsState, OperatorId, Params, Stake,
    },
    Error, NAMESPACE,
};
use bytes::Bytes;
use commonware_codec::DecodeExt;
use commonware_cryptography::bls12381::primitives::{
    group::{Element, G1, G2},
    ops,
    variant::MinSig,
};
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Metrics, Spawner};
use futures::{channel::mpsc, StreamExt};
use std::collections::BTreeMap;
use tracing::{debug, info, trace, warn};

/// Operator and quorum state at the reference block.
struct Snapshot {
    operators: BTreeMap<OperatorId, OperatorAvsState>,

    /// In requested quorum order.
    total_stake_per_quorum: Vec<Stake>,
    quorum_apks_g1: Vec<G1>,
}

impl Snapshot {
    /// Read the snapshot, rejecting registries that break their contract.
    async fn load<R: Registry>(registry: &R, params: &Params) -> Result<Self, registry::Error> {
        let quorums = &params.quorum_numbers;
        let operators = registry
            .operators_at(quorums, params.reference_block)
            .await?;
        for (id, state) in operators.iter() {
            if state.pubkey_g2 == G2::zero() {
                return Err(registry::Error::MissingPublicKey(*id));
            }
            let staked = quorums.iter().any(|q| {
                state
                    .stake_per_quorum
                    .get(q)
                    .is_some_and(|stake| *stake > Stake::default())
            });
            if !staked {
                return Err(registry::Error::NoStake(*id));
            }
        }

        let mut quorum_states = registry.quorums_at(quorums, params.reference_block).await?;
        let mut total_stake_per_quorum = Vec::with_capacity(quorums.len());
        let mut quorum_apks_g1 = Vec::with_capacity(quorums.len());
        for quorum in quorums {
            let state = quorum_states
                .remove(quorum)
                .ok_or(registry::Error::MissingQuorum(*quorum))?;
            total_stake_per_quorum.push(state.total_stake);
            quorum_apks_g1.push(state.aggregate_pubkey_g1);
        }
        Ok(Self {
            operators,
            total_stake_per_quorum,
            quorum_apks_g1,
        })
    }
}

/// Aggregates signatures over a single digest.
///
/// The aggregator snapshots the operator set, verifies and merges signatures in arrival order
/// and emits exactly one [AggregationResult] before exiting.
pub struct Aggregator<E: Clock + Spawner + Metrics, R: Registry> {
    context: E,
    registry: R,
    params: Params,

    mailbox: mpsc::Receiver<Message>,
}

impl<E: Clock + Spawner + Metrics, R: Registry> Aggregator<E, R> {
    /// Create a new aggregator and the mailbox used to submit signatures to it.
    pub fn new(context: E, cfg: Config<R>) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel(cfg.mailbox_size);
        let mailbox = Mailbox::new(cfg.params.digest, sender);
        (
            Self {
                context,
                registry: cfg.registry,
                params: cfg.params,
                mailbox: receiver,
            },
            mailbox,
        )
    }

    /// Start the aggregator. Its result is sent to `results`.
    pub fn start(mut self, results: mpsc::UnboundedSender<AggregationResult>) -> Handle<()> {
        self.context.spawn_ref()(self.run(results))
    }

    async fn run(mut self, results: mpsc::UnboundedSender<AggregationResult>) {
        let digest = self.params.digest;
        let outcome = self.aggregate().await;

        // Anything that reached the queue after the last read is rejected rather than dropped
        self.mailbox.close();
        while let Ok(message) = self.mailbox.try_recv() {
            let Message::Verify { responder, .. } = message;
            let _ = responder.send(Err(Error::MessageNotFound(digest)));
        }

        match &outcome {
            Ok(aggregation) => info!(
                %digest,
                signers = aggregation.signers.len(),
                non_signers = aggregation.non_signer_pubkeys_g1.len(),
                "aggregated"
            ),
            Err(err) => warn!(%digest, ?err, "aggregation failed"),
        }
        if results
            .unbounded_send(AggregationResult { digest, outcome })
            .is_err()
        {
            debug!(%digest, "results dropped");
        }
    }

    async fn aggregate(&mut self) -> Result<Aggregation, Error> {
        self.params.validate()?;
        let mut deadline = self.context.current() + self.params.time_to_expiry;
        let mut shutdown = self.context.stopped();

        // The expiry timer also bounds startup
        let snapshot;
        select! {
            _ = &mut shutdown => {
                return Err(Error::Cancelled);
            },
            _ = self.context.sleep_until(deadline) => {
                return Err(Error::MessageExpired);
            },
            result = Snapshot::load(&self.registry, &self.params) => {
                snapshot = result.map_err(Error::RegistryUnavailable)?;
            },
        }
        debug!(
            digest = %self.params.digest,
            block = self.params.reference_block,
            operators = snapshot.operators.len(),
            "collecting"
        );

        let mut partial = Partial::new(
            self.params.quorum_numbers.clone(),
            self.params.quorum_threshold_percentages.clone(),
        );
        loop {
            let message;
            select! {
                _ = &mut shutdown => {
                    return Err(Error::Cancelled);
                },
                _ = self.context.sleep_until(deadline) => {
                    return Err(Error::MessageExpired);
                },
                mail = self.mailbox.next() => {
                    message = mail;
                },
            }
            let Some(Message::Verify {
                operator_id,
                signature,
                responder,
            }) = message
            else {
                // Every mailbox was dropped, so no signature can arrive
                return Err(Error::Cancelled);
            };

            // Reply before acting on the verdict
            let (state, signature) = match self.verify(&snapshot, operator_id, &signature) {
                Ok(verified) => {
                    let _ = responder.send(Ok(()));
                    verified
                }
                Err(err) => {
                    debug!(digest = %self.params.digest, operator = %operator_id, ?err, "rejected signature");
                    let _ = responder.send(Err(err));
                    continue;
                }
            };
            let first = partial.is_empty();
            if !partial.add(operator_id, state, &signature) {
                trace!(digest = %self.params.digest, operator = %operator_id, "duplicate signature");
                continue;
            }
            trace!(digest = %self.params.digest, operator = %operator_id, "merged signature");
            if first {
                if let Some(timeout) = self.params.aggregation_timeout {
                    deadline = deadline.min(self.context.current() + timeout);
                }
            }
            if partial.ready(&snapshot.total_stake_per_quorum) {
                break;
            }
        }

        // Non-signers must reach the verifier ascending by id
        let non_signers = partial.non_signers(&snapshot.operators);
        let non_signer_ids: Vec<OperatorId> = non_signers.iter().map(|(id, _)| *id).collect();
        let non_signer_pubkeys_g1: Vec<G1> =
            non_signers.iter().map(|(_, state)| state.pubkey_g1).collect();
        let indices;
        select! {
            _ = &mut shutdown => {
                return Err(Error::Cancelled);
            },
            result = self.registry.check_signatures_indices(
                self.params.reference_block,
                &self.params.quorum_numbers,
                &non_signer_ids,
            ) => {
                indices = result.map_err(Error::IndicesUnavailable)?;
            },
        }

        Ok(Aggregation {
            digest: self.params.digest,
            eth_block_number: self.params.reference_block,
            signers: partial.signers().clone(),
            non_signer_pubkeys_g1,
            quorum_apks_g1: snapshot.quorum_apks_g1,
            signers_apk_g2: partial.signers_apk_g2(),
            signers_agg_sig_g1: partial.signers_agg_sig_g1(),
            signed_stake_per_quorum: partial.signed_stake(),
            total_stake_per_quorum: snapshot.total_stake_per_quorum,
            non_signer_quorum_bitmap_indices: indices.non_signer_quorum_bitmap_indices,
            quorum_apk_indices: indices.quorum_apk_indices,
            total_stake_indices: indices.total_stake_indices,
            non_signer_stake_indices: indices.non_signer_stake_indices,
        })
    }

    /// Check that `signature` is a valid signature by `operator_id` over the digest.
    fn verify<'a>(
        &self,
        snapshot: &'a Snapshot,
        operator_id: OperatorId,
        signature: &Bytes,
    ) -> Result<(&'a OperatorAvsState, G1), Error> {
        let state = snapshot
            .operators
            .get(&operator_id)
            .ok_or(Error::OperatorNotInQuorum(operator_id))?;
        let signature =
            G1::decode(signature.as_ref()).map_err(Error::SignatureVerificationError)?;
        ops::verify_message::<MinSig>(
            &state.pubkey_g2,
            Some(NAMESPACE),
            self.params.digest.as_slice(),
            &signature,
        )
        .map_err(|_| Error::IncorrectSignature)?;
        Ok((state, signature))
    }
}
