use super::{Error, Registry};
use crate::types::{
    BlockNumber, IndexBundle, OperatorAvsState, OperatorId, QuorumAvsState, QuorumNumber,
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};
use tracing::trace;

/// Snapshots are keyed by reference block first so eviction drops the oldest block.
type Key = (BlockNumber, Vec<QuorumNumber>);

/// A [Registry] that remembers operator and quorum snapshots.
///
/// State at a given block never changes, so snapshots are kept until `capacity` newer entries
/// push them out. Failed reads and index lookups are never cached.
#[derive(Clone)]
pub struct Cached<R: Registry> {
    inner: R,
    capacity: usize,

    operators: Arc<Mutex<BTreeMap<Key, BTreeMap<OperatorId, OperatorAvsState>>>>,
    quorums: Arc<Mutex<BTreeMap<Key, BTreeMap<QuorumNumber, QuorumAvsState>>>>,
}

impl<R: Registry> Cached<R> {
    /// Wrap `inner`, keeping at most `capacity` snapshots of each kind.
    pub fn new(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            operators: Arc::default(),
            quorums: Arc::default(),
        }
    }

    fn insert<V>(&self, cache: &Mutex<BTreeMap<Key, V>>, key: Key, value: V) {
        let mut cache = cache.lock().unwrap();
        cache.insert(key, value);
        while cache.len() > self.capacity {
            cache.pop_first();
        }
    }
}

impl<R: Registry> Registry for Cached<R> {
    async fn operators_at(
        &self,
        quorums: &[QuorumNumber],
        block: BlockNumber,
    ) -> Result<BTreeMap<OperatorId, OperatorAvsState>, Error> {
        let key = (block, quorums.to_vec());
        let cached = self.operators.lock().unwrap().get(&key).cloned();
        if let Some(operators) = cached {
            trace!(block, "operator snapshot cached");
            return Ok(operators);
        }
        let operators = self.inner.operators_at(quorums, block).await?;
        self.insert(&self.operators, key, operators.clone());
        Ok(operators)
    }

    async fn quorums_at(
        &self,
        quorums: &[QuorumNumber],
        block: BlockNumber,
    ) -> Result<BTreeMap<QuorumNumber, QuorumAvsState>, Error> {
        let key = (block, quorums.to_vec());
        let cached = self.quorums.lock().unwrap().get(&key).cloned();
        if let Some(snapshot) = cached {
            trace!(block, "quorum snapshot cached");
            return Ok(snapshot);
        }
        let snapshot = self.inner.quorums_at(quorums, block).await?;
        self.insert(&self.quorums, key, snapshot.clone());
        Ok(snapshot)
    }

    async fn check_signatures_indices(
        &self,
        block: BlockNumber,
        quorums: &[QuorumNumber],
        non_signers: &[OperatorId],
    ) -> Result<IndexBundle, Error> {
        self.inner
            .check_signatures_indices(block, quorums, non_signers)
            .await
    }
}
