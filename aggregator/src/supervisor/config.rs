use crate::registry::Registry;
use std::time::Duration;

/// Configuration for the [`Supervisor`](super::Supervisor).
pub struct Config<R: Registry> {
    /// Source of operator state, shared by every aggregator.
    pub registry: R,

    /// The maximum size of the mailbox backlog.
    pub mailbox_size: usize,

    /// The maximum number of signatures queued at each aggregator.
    pub aggregator_mailbox_size: usize,

    /// Window, measured from the first accepted signature, within which a checkpoint task must
    /// reach its threshold.
    pub task_aggregation_timeout: Option<Duration>,
}
