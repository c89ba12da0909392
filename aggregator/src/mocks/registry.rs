use crate::{
    registry::{self, Fixed},
    types::{
        BlockNumber, IndexBundle, OperatorAvsState, OperatorId, QuorumAvsState, QuorumNumber,
    },
};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
};

#[derive(Default)]
struct State {
    fail_snapshots: bool,
    stall_snapshots: bool,
    fail_indices: bool,

    snapshot_calls: usize,
    index_calls: Vec<Vec<OperatorId>>,
}

/// A [registry::Registry] over a [Fixed] operator set that can fail, stall and count calls.
#[derive(Clone)]
pub struct Registry {
    inner: Fixed,
    state: Arc<Mutex<State>>,
}

impl Registry {
    pub fn new(inner: Fixed) -> Self {
        Self {
            inner,
            state: Arc::default(),
        }
    }

    pub fn set_fail_snapshots(&self, fail: bool) {
        self.state.lock().unwrap().fail_snapshots = fail;
    }

    /// Snapshot reads never resolve.
    pub fn set_stall_snapshots(&self, stall: bool) {
        self.state.lock().unwrap().stall_snapshots = stall;
    }

    pub fn set_fail_indices(&self, fail: bool) {
        self.state.lock().unwrap().fail_indices = fail;
    }

    /// Number of snapshot reads (of either kind) that reached this registry.
    pub fn snapshot_calls(&self) -> usize {
        self.state.lock().unwrap().snapshot_calls
    }

    /// Non-signers passed to each index lookup.
    pub fn index_calls(&self) -> Vec<Vec<OperatorId>> {
        self.state.lock().unwrap().index_calls.clone()
    }

    /// Records a snapshot read and returns whether it should fail or stall.
    fn snapshot(&self) -> (bool, bool) {
        let mut state = self.state.lock().unwrap();
        state.snapshot_calls += 1;
        (state.fail_snapshots, state.stall_snapshots)
    }
}

impl registry::Registry for Registry {
    async fn operators_at(
        &self,
        quorums: &[QuorumNumber],
        block: BlockNumber,
    ) -> Result<BTreeMap<OperatorId, OperatorAvsState>, registry::Error> {
        let (fail, stall) = self.snapshot();
        if stall {
            futures::future::pending::<()>().await;
        }
        if fail {
            return Err(registry::Error::Unavailable("operators".into()));
        }
        registry::Registry::operators_at(&self.inner, quorums, block).await
    }

    async fn quorums_at(
        &self,
        quorums: &[QuorumNumber],
        block: BlockNumber,
    ) -> Result<BTreeMap<QuorumNumber, QuorumAvsState>, registry::Error> {
        let (fail, stall) = self.snapshot();
        if stall {
            futures::future::pending::<()>().await;
        }
        if fail {
            return Err(registry::Error::Unavailable("quorums".into()));
        }
        registry::Registry::quorums_at(&self.inner, quorums, block).await
    }

    async fn check_signatures_indices(
        &self,
        block: BlockNumber,
        quorums: &[QuorumNumber],
        non_signers: &[OperatorId],
    ) -> Result<IndexBundle, registry::Error> {
        let fail = {
            let mut state = self.state.lock().unwrap();
            state.index_calls.push(non_signers.to_vec());
            state.fail_indices
        };
        if fail {
            return Err(registry::Error::Unavailable("indices".into()));
        }
        registry::Registry::check_signatures_indices(&self.inner, block, quorums, non_signers)
            .await
    }
}
