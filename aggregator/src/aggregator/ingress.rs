use crate::{
    types::{MessageDigest, OperatorId},
    Error,
};
use bytes::Bytes;
use futures::{
    channel::{mpsc, oneshot},
    SinkExt,
};

/// A signature over the digest owned by an aggregator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedDigest {
    pub digest: MessageDigest,

    /// Encoded G1 signature.
    pub signature: Bytes,

    pub operator_id: OperatorId,
}

/// Message types that can be sent to the `Mailbox`.
pub(crate) enum Message {
    /// Verify a signature and, if valid, merge it.
    ///
    /// The verdict is sent before the aggregator checks whether it is ready.
    Verify {
        operator_id: OperatorId,
        signature: Bytes,
        responder: oneshot::Sender<Result<(), Error>>,
    },
}

/// Ingress mailbox for [`Aggregator`](super::Aggregator).
#[derive(Clone)]
pub struct Mailbox {
    digest: MessageDigest,
    sender: mpsc::Sender<Message>,
}

impl Mailbox {
    pub(super) fn new(digest: MessageDigest, sender: mpsc::Sender<Message>) -> Self {
        Self { digest, sender }
    }

    /// Digest owned by the aggregator.
    pub fn digest(&self) -> MessageDigest {
        self.digest
    }

    /// Submit a signature and wait for its verdict.
    ///
    /// Returns [Error::MessageNotFound] if the aggregator terminated before processing it.
    pub async fn verify(&mut self, operator_id: OperatorId, signature: Bytes) -> Result<(), Error> {
        let (responder, receiver) = oneshot::channel();
        self.sender
            .send(Message::Verify {
                operator_id,
                signature,
                responder,
            })
            .await
            .map_err(|_| Error::MessageNotFound(self.digest))?;
        receiver
            .await
            .map_err(|_| Error::MessageNotFound(self.digest))?
    }

    /// Submit a [SignedDigest] for this mailbox's digest.
    pub async fn submit(&mut self, signed: SignedDigest) -> Result<(), Error> {
        if signed.digest != self.digest {
            return Err(Error::MessageNotFound(signed.digest));
        }
        self.verify(signed.operator_id, signed.signature).await
    }
}
