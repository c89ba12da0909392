//! Accept signed messages from operators and chain events.
//!
//! The [Handler] derives the digest of each signed message, applies the configured default
//! quorums and expiry, and forwards the signature to the [supervisor](crate::supervisor). Every
//! request is bounded by `request_timeout`: a request that takes longer returns
//! [Error::Cancelled] while the aggregator still processes the signature.

use crate::{
    messages::{
        SignedCheckpointTaskResponse, SignedOperatorSetUpdateMessage,
        SignedStateRootUpdateMessage, Signable,
    },
    registry::AvsReader,
    supervisor,
    types::{BlockNumber, MessageDigest, Params, QuorumNumber, TaskIndex, ThresholdPercentage},
    Error,
};
use commonware_macros::select;
use commonware_runtime::Clock;
use std::{future::Future, time::Duration};
use tracing::debug;

/// Configuration for the [Handler].
#[derive(Clone)]
pub struct Config<A: AvsReader> {
    /// Resolves the block of operator-set updates.
    pub avs_reader: A,

    /// Quorums messages are aggregated over, unless a task says otherwise.
    pub quorum_numbers: Vec<QuorumNumber>,

    /// Threshold for each entry of `quorum_numbers`.
    pub quorum_threshold_percentages: Vec<ThresholdPercentage>,

    /// Expiry of aggregations started for state-root and operator-set updates.
    pub message_ttl: Duration,

    /// Time after which a request returns [Error::Cancelled].
    pub request_timeout: Duration,
}

/// Entry point for signed messages.
#[derive(Clone)]
pub struct Handler<E: Clock, A: AvsReader> {
    context: E,
    supervisor: supervisor::Mailbox,
    cfg: Config<A>,
}

impl<E: Clock, A: AvsReader> Handler<E, A> {
    pub fn new(context: E, supervisor: supervisor::Mailbox, cfg: Config<A>) -> Self {
        Self {
            context,
            supervisor,
            cfg,
        }
    }

    /// Submit an operator's response to a checkpoint task.
    ///
    /// The task must have been initialized with [Handler::initialize_checkpoint_task].
    pub async fn process_signed_checkpoint_task_response(
        &self,
        signed: SignedCheckpointTaskResponse,
    ) -> Result<(), Error> {
        let digest = signed.task_response.digest();
        let index = signed.task_response.task_index();
        debug!(index, %digest, operator = %signed.operator_id, "checkpoint task response");
        let mut supervisor = self.supervisor.clone();
        self.timed(supervisor.process_task_signature(
            index,
            digest,
            signed.operator_id,
            signed.signature,
        ))
        .await
    }

    /// Submit an operator's signature over a state-root update.
    ///
    /// State-root updates are not tied to a chain snapshot, so they are aggregated against the
    /// operator set at block 0.
    pub async fn process_signed_state_root_update(
        &self,
        signed: SignedStateRootUpdateMessage,
    ) -> Result<(), Error> {
        let digest = signed.message.digest();
        debug!(
            rollup = signed.message.rollupId,
            height = signed.message.blockHeight,
            %digest,
            operator = %signed.operator_id,
            "state root update"
        );
        let params = self.params(digest, 0);
        let mut supervisor = self.supervisor.clone();
        self.timed(supervisor.process_signature_or_initialize(
            params,
            signed.operator_id,
            signed.signature,
        ))
        .await
    }

    /// Submit an operator's signature over an operator-set update.
    ///
    /// The update is aggregated against the operator set just before the block at which it was
    /// recorded.
    pub async fn process_signed_operator_set_update(
        &self,
        signed: SignedOperatorSetUpdateMessage,
    ) -> Result<(), Error> {
        let digest = signed.message.digest();
        let id = signed.message.id;
        debug!(id, %digest, operator = %signed.operator_id, "operator set update");
        self.timed(async move {
            let block = self
                .cfg
                .avs_reader
                .operator_set_update_block(id)
                .await
                .map_err(Error::AvsReaderUnavailable)?;
            let params = self.params(digest, block.saturating_sub(1));
            let mut supervisor = self.supervisor.clone();
            supervisor
                .process_signature_or_initialize(params, signed.operator_id, signed.signature)
                .await
        })
        .await
    }

    /// Record a checkpoint task observed on chain.
    pub async fn initialize_checkpoint_task(
        &self,
        index: TaskIndex,
        reference_block: BlockNumber,
        quorum_numbers: Vec<QuorumNumber>,
        quorum_threshold_percentages: Vec<ThresholdPercentage>,
        time_to_expiry: Duration,
    ) -> Result<(), Error> {
        debug!(index, block = reference_block, "checkpoint task");
        let mut supervisor = self.supervisor.clone();
        self.timed(supervisor.initialize_checkpoint_task(
            index,
            reference_block,
            quorum_numbers,
            quorum_threshold_percentages,
            time_to_expiry,
        ))
        .await
    }

    fn params(&self, digest: MessageDigest, reference_block: BlockNumber) -> Params {
        Params {
            digest,
            quorum_numbers: self.cfg.quorum_numbers.clone(),
            quorum_threshold_percentages: self.cfg.quorum_threshold_percentages.clone(),
            reference_block,
            time_to_expiry: self.cfg.message_ttl,
            aggregation_timeout: None,
        }
    }

    /// Run `request`, giving up after `request_timeout`.
    async fn timed<T>(&self, request: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        let result;
        select! {
            _ = self.context.sleep(self.cfg.request_timeout) => {
                debug!("request timed out");
                result = Err(Error::Cancelled);
            },
            response = request => {
                result = response;
            },
        }
        result
    }
}
