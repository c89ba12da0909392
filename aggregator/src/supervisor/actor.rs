use super::{
    ingress::Task,
    metrics::{self, Outcome},
    Config, Mailbox, Message,
};
use crate::{
    aggregator::{self, Aggregator},
    registry::Registry,
    types::{validate_quorums, AggregationResult, MessageDigest, Params, TaskIndex},
    Error,
};
use commonware_macros::select;
use commonware_runtime::{Clock, Handle, Metrics, Spawner};
use futures::{channel::mpsc, StreamExt};
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    time::{Duration, SystemTime},
};
use tracing::{debug, info, trace, warn};

/// A recorded checkpoint task.
struct Recorded {
    task: Task,
    deadline: SystemTime,

    /// Response digests an aggregator was started for.
    started: BTreeSet<MessageDigest>,
}

/// Owns the live aggregators.
///
/// All changes to the set of live aggregators are serialized through the supervisor's mailbox.
/// Aggregator results are routed back through the supervisor, which removes the digest before
/// forwarding the result, so a digest is never live once its result can be observed.
pub struct Supervisor<E: Clock + Spawner + Metrics, R: Registry> {
    ////////////////////////////////////////
    // Interfaces
    ////////////////////////////////////////
    context: E,
    registry: R,

    ////////////////////////////////////////
    // Configuration
    ////////////////////////////////////////
    aggregator_mailbox_size: usize,
    task_aggregation_timeout: Option<Duration>,

    ////////////////////////////////////////
    // Messaging
    ////////////////////////////////////////
    mailbox: mpsc::Receiver<Message>,

    /// Handed to every aggregator for its result.
    terminations_sender: mpsc::UnboundedSender<AggregationResult>,
    terminations: mpsc::UnboundedReceiver<AggregationResult>,

    results: mpsc::UnboundedSender<AggregationResult>,

    ////////////////////////////////////////
    // State
    ////////////////////////////////////////
    live: HashMap<MessageDigest, aggregator::Mailbox>,
    tasks: BTreeMap<TaskIndex, Recorded>,

    ////////////////////////////////////////
    // Metrics
    ////////////////////////////////////////
    metrics: metrics::Metrics,
}

impl<E: Clock + Spawner + Metrics, R: Registry> Supervisor<E, R> {
    /// Creates a new supervisor with the given context and configuration.
    ///
    /// Returns the supervisor, a mailbox for sending requests to it and the stream of aggregation
    /// results.
    pub fn new(
        context: E,
        cfg: Config<R>,
    ) -> (Self, Mailbox, mpsc::UnboundedReceiver<AggregationResult>) {
        let (mailbox_sender, mailbox_receiver) = mpsc::channel(cfg.mailbox_size);
        let (terminations_sender, terminations) = mpsc::unbounded();
        let (results, results_receiver) = mpsc::unbounded();
        let metrics = metrics::Metrics::init(context.clone());

        let supervisor = Self {
            context,
            registry: cfg.registry,
            aggregator_mailbox_size: cfg.aggregator_mailbox_size,
            task_aggregation_timeout: cfg.task_aggregation_timeout,
            mailbox: mailbox_receiver,
            terminations_sender,
            terminations,
            results,
            live: HashMap::new(),
            tasks: BTreeMap::new(),
            metrics,
        };
        (supervisor, Mailbox::new(mailbox_sender), results_receiver)
    }

    /// Starts the supervisor.
    pub fn start(mut self) -> Handle<()> {
        self.context.spawn_ref()(self.run())
    }

    async fn run(mut self) {
        let mut shutdown = self.context.stopped();
        loop {
            select! {
                _ = &mut shutdown => {
                    debug!("shutdown");
                    break;
                },

                // Handle results before requests so terminated digests are never handed out
                result = self.terminations.next() => {
                    let Some(result) = result else {
                        break;
                    };
                    self.handle_termination(result);
                },

                mail = self.mailbox.next() => {
                    let Some(msg) = mail else {
                        debug!("mailbox closed");
                        break;
                    };
                    match msg {
                        Message::Initialize { params, responder } => {
                            trace!(digest = %params.digest, "mailbox: initialize");
                            let _ = responder.send(self.initialize(params));
                        }
                        Message::Lookup { digest, initialize, responder } => {
                            trace!(%digest, "mailbox: lookup");
                            let _ = responder.send(self.lookup(digest, initialize));
                        }
                        Message::InitializeTask { index, task, responder } => {
                            trace!(index, "mailbox: initialize task");
                            let _ = responder.send(self.initialize_task(index, task));
                        }
                        Message::LookupTask { index, digest, responder } => {
                            trace!(index, %digest, "mailbox: lookup task");
                            let _ = responder.send(self.lookup_task(index, digest));
                        }
                        Message::IsLive { digest, responder } => {
                            let _ = responder.send(self.live.contains_key(&digest));
                        }
                    }
                },
            }
        }

        // Reject new requests, then wait for every live aggregator to emit
        self.mailbox.close();
        while let Ok(msg) = self.mailbox.try_recv() {
            drop(msg);
        }
        info!(live = self.live.len(), "draining aggregators");
        while !self.live.is_empty() {
            let Some(result) = self.terminations.next().await else {
                break;
            };
            self.handle_termination(result);
        }
    }

    /// Start an aggregator unless `params.digest` is already live.
    fn initialize(&mut self, params: Params) -> Result<(), Error> {
        if self.live.contains_key(&params.digest) {
            return Err(Error::MessageAlreadyInitialized(params.digest));
        }
        self.spawn(params)?;
        Ok(())
    }

    fn lookup(
        &mut self,
        digest: MessageDigest,
        initialize: Option<Params>,
    ) -> Result<aggregator::Mailbox, Error> {
        if let Some(mailbox) = self.live.get(&digest) {
            return Ok(mailbox.clone());
        }
        match initialize {
            Some(params) => self.spawn(params),
            None => Err(Error::MessageNotFound(digest)),
        }
    }

    fn initialize_task(&mut self, index: TaskIndex, task: Task) -> Result<(), Error> {
        let now = self.context.current();
        self.prune_tasks(now);
        validate_quorums(&task.quorum_numbers, &task.quorum_threshold_percentages)?;
        if self.tasks.contains_key(&index) {
            debug!(index, "task already initialized");
            return Ok(());
        }
        debug!(index, block = task.reference_block, "task initialized");
        self.tasks.insert(
            index,
            Recorded {
                deadline: now + task.time_to_expiry,
                task,
                started: BTreeSet::new(),
            },
        );
        self.metrics.tasks.set(self.tasks.len() as i64);
        Ok(())
    }

    fn lookup_task(
        &mut self,
        index: TaskIndex,
        digest: MessageDigest,
    ) -> Result<aggregator::Mailbox, Error> {
        let now = self.context.current();
        self.prune_tasks(now);
        if let Some(mailbox) = self.live.get(&digest) {
            return Ok(mailbox.clone());
        }
        let Some(recorded) = self.tasks.get_mut(&index) else {
            debug!(index, %digest, "unknown task");
            return Err(Error::MessageNotFound(digest));
        };

        // Each response is aggregated at most once
        if !recorded.started.insert(digest) {
            return Err(Error::MessageNotFound(digest));
        }
        let remaining = recorded
            .deadline
            .duration_since(now)
            .map_err(|_| Error::MessageNotFound(digest))?;
        let params = Params {
            digest,
            quorum_numbers: recorded.task.quorum_numbers.clone(),
            quorum_threshold_percentages: recorded.task.quorum_threshold_percentages.clone(),
            reference_block: recorded.task.reference_block,
            time_to_expiry: remaining,
            aggregation_timeout: self.task_aggregation_timeout,
        };
        self.spawn(params)
    }

    /// Forget tasks whose deadline has passed.
    fn prune_tasks(&mut self, now: SystemTime) {
        self.tasks.retain(|index, recorded| {
            let keep = recorded.deadline > now;
            if !keep {
                trace!(index, "pruned task");
            }
            keep
        });
        self.metrics.tasks.set(self.tasks.len() as i64);
    }

    fn spawn(&mut self, params: Params) -> Result<aggregator::Mailbox, Error> {
        params.validate()?;
        let digest = params.digest;
        let (aggregator, mailbox) = Aggregator::new(
            self.context.with_label("aggregator"),
            aggregator::Config {
                registry: self.registry.clone(),
                params,
                mailbox_size: self.aggregator_mailbox_size,
            },
        );
        aggregator.start(self.terminations_sender.clone());
        self.live.insert(digest, mailbox.clone());
        self.metrics.initialized.inc();
        self.metrics.live.set(self.live.len() as i64);
        debug!(%digest, "initialized");
        Ok(mailbox)
    }

    fn handle_termination(&mut self, result: AggregationResult) {
        if self.live.remove(&result.digest).is_none() {
            warn!(digest = %result.digest, "result from unknown aggregator");
        }
        self.metrics.live.set(self.live.len() as i64);
        self.prune_tasks(self.context.current());
        let outcome = match &result.outcome {
            Ok(_) => Outcome::Completed,
            Err(Error::MessageExpired) => Outcome::Expired,
            Err(Error::Cancelled) => Outcome::Cancelled,
            Err(_) => Outcome::Failed,
        };
        self.metrics.terminated(outcome);
        if self.results.unbounded_send(result).is_err() {
            debug!("results receiver dropped");
        }
    }
}
