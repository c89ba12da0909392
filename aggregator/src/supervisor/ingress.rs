use crate::{
    aggregator::{self, SignedDigest},
    types::{
        BlockNumber, MessageDigest, OperatorId, Params, QuorumNumber, TaskIndex,
        ThresholdPercentage,
    },
    Error,
};
use bytes::Bytes;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};
use std::time::Duration;

/// Parameters of a checkpoint task, shared by every response to it.
#[derive(Clone, Debug)]
pub struct Task {
    pub reference_block: BlockNumber,
    pub quorum_numbers: Vec<QuorumNumber>,
    pub quorum_threshold_percentages: Vec<ThresholdPercentage>,

    /// Time, from initialization, after which responses to the task are no longer aggregated.
    pub time_to_expiry: Duration,
}

/// Message types that can be sent to the `Mailbox`.
pub(crate) enum Message {
    /// Start an aggregator for `params.digest`.
    Initialize {
        params: Params,
        responder: oneshot::Sender<Result<(), Error>>,
    },

    /// Return the aggregator for `digest`, starting one with `initialize` if it is absent.
    Lookup {
        digest: MessageDigest,
        initialize: Option<Params>,
        responder: oneshot::Sender<Result<aggregator::Mailbox, Error>>,
    },

    /// Record a checkpoint task.
    InitializeTask {
        index: TaskIndex,
        task: Task,
        responder: oneshot::Sender<Result<(), Error>>,
    },

    /// Return the aggregator for a response to task `index`, starting it if it is absent.
    LookupTask {
        index: TaskIndex,
        digest: MessageDigest,
        responder: oneshot::Sender<Result<aggregator::Mailbox, Error>>,
    },

    /// Report whether an aggregator for `digest` is live.
    IsLive {
        digest: MessageDigest,
        responder: oneshot::Sender<bool>,
    },
}

/// Ingress mailbox for [`Supervisor`](super::Supervisor).
///
/// Every method returns [Error::Cancelled] once the supervisor has stopped.
#[derive(Clone)]
pub struct Mailbox {
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    pub(super) fn new(sender: mpsc::Sender<Message>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &mut self,
        message: impl FnOnce(oneshot::Sender<T>) -> Message,
    ) -> Result<T, Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(message(responder))
            .await
            .map_err(|_| Error::Cancelled)?;
        receiver.await.map_err(|_| Error::Cancelled)
    }

    /// Start an aggregator for `params.digest`.
    ///
    /// Returns [Error::MessageAlreadyInitialized] if one is already live.
    pub async fn initialize_message(&mut self, params: Params) -> Result<(), Error> {
        self.request(|responder| Message::Initialize { params, responder })
            .await?
    }

    /// Start an aggregator for `params.digest` unless one is already live.
    pub async fn initialize_message_if_absent(&mut self, params: Params) -> Result<(), Error> {
        match self.initialize_message(params).await {
            Err(Error::MessageAlreadyInitialized(_)) => Ok(()),
            result => result,
        }
    }

    /// Submit a signature over `digest` and wait for its verdict.
    ///
    /// Returns [Error::MessageNotFound] if no aggregator for `digest` is live.
    pub async fn process_signature(
        &mut self,
        digest: MessageDigest,
        operator_id: OperatorId,
        signature: Bytes,
    ) -> Result<(), Error> {
        let mut aggregator = self
            .request(|responder| Message::Lookup {
                digest,
                initialize: None,
                responder,
            })
            .await??;
        aggregator
            .submit(SignedDigest {
                digest,
                signature,
                operator_id,
            })
            .await
    }

    /// Submit a signature over `params.digest`, first starting an aggregator with `params` if
    /// none is live.
    pub async fn process_signature_or_initialize(
        &mut self,
        params: Params,
        operator_id: OperatorId,
        signature: Bytes,
    ) -> Result<(), Error> {
        let digest = params.digest;
        let mut aggregator = self
            .request(|responder| Message::Lookup {
                digest,
                initialize: Some(params),
                responder,
            })
            .await??;
        aggregator
            .submit(SignedDigest {
                digest,
                signature,
                operator_id,
            })
            .await
    }

    /// Record checkpoint task `index` so that responses to it can be aggregated.
    ///
    /// Initializing a task that is already recorded has no effect.
    pub async fn initialize_checkpoint_task(
        &mut self,
        index: TaskIndex,
        reference_block: BlockNumber,
        quorum_numbers: Vec<QuorumNumber>,
        quorum_threshold_percentages: Vec<ThresholdPercentage>,
        time_to_expiry: Duration,
    ) -> Result<(), Error> {
        let task = Task {
            reference_block,
            quorum_numbers,
            quorum_threshold_percentages,
            time_to_expiry,
        };
        self.request(|responder| Message::InitializeTask {
            index,
            task,
            responder,
        })
        .await?
    }

    /// Submit a signature over `digest`, a response to checkpoint task `index`.
    ///
    /// Returns [Error::MessageNotFound] if the task is unknown or has expired.
    pub async fn process_task_signature(
        &mut self,
        index: TaskIndex,
        digest: MessageDigest,
        operator_id: OperatorId,
        signature: Bytes,
    ) -> Result<(), Error> {
        let mut aggregator = self
            .request(|responder| Message::LookupTask {
                index,
                digest,
                responder,
            })
            .await??;
        aggregator
            .submit(SignedDigest {
                digest,
                signature,
                operator_id,
            })
            .await
    }

    /// Returns whether an aggregator for `digest` is live.
    pub async fn is_live(&mut self, digest: MessageDigest) -> Result<bool, Error> {
        self.request(|responder| Message::IsLive { digest, responder })
            .await
    }
}
