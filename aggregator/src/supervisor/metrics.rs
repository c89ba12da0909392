use commonware_runtime::Metrics as RuntimeMetrics;
use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, gauge::Gauge},
};

/// How an aggregator ended.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Completed,
    Expired,
    Failed,
    Cancelled,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct Terminated {
    pub outcome: Outcome,
}

/// Metrics for the [`Supervisor`](super::Supervisor).
#[derive(Default)]
pub struct Metrics {
    /// Number of live aggregators
    pub live: Gauge,
    /// Number of recorded checkpoint tasks
    pub tasks: Gauge,
    /// Number of aggregators started
    pub initialized: Counter,
    /// Number of aggregators terminated by outcome
    pub terminated: Family<Terminated, Counter>,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given context.
    pub fn init<E: RuntimeMetrics>(context: E) -> Self {
        let metrics = Metrics::default();
        context.register("live", "Number of live aggregators", metrics.live.clone());
        context.register(
            "tasks",
            "Number of recorded checkpoint tasks",
            metrics.tasks.clone(),
        );
        context.register(
            "initialized",
            "Number of aggregators started",
            metrics.initialized.clone(),
        );
        context.register(
            "terminated",
            "Number of aggregators terminated by outcome",
            metrics.terminated.clone(),
        );
        metrics
    }

    pub fn terminated(&self, outcome: Outcome) {
        self.terminated
            .get_or_create(&Terminated { outcome })
            .inc();
    }
}
