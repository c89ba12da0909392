use crate::{registry::Registry, types::Params};

/// Configuration for the [`Aggregator`](super::Aggregator).
pub struct Config<R: Registry> {
    /// Source of the operator set at the reference block.
    pub registry: R,

    /// What to aggregate.
    pub params: Params,

    /// The maximum number of queued signatures.
    pub mailbox_size: usize,
}
