//! Route signatures to per-digest aggregators.
//!
//! # Overview
//!
//! The [Supervisor] owns the set of live [Aggregator](crate::aggregator::Aggregator)s, keyed by
//! digest. Requests arrive through its [Mailbox] and are handled one at a time:
//! - initializing a digest starts an aggregator for it (idempotently, if requested),
//! - a signature is forwarded to the aggregator for its digest and the caller waits for the
//!   verdict,
//! - checkpoint tasks are recorded by index so that the first signed response to a task starts
//!   its aggregator with the task's parameters and remaining time.
//!
//! Every aggregator reports its single result to the supervisor, which removes the digest from
//! the live set and forwards the result on the stream returned by [Supervisor::new]. A signature
//! racing with termination is either applied or rejected with
//! [MessageNotFound](crate::Error::MessageNotFound).
//!
//! On shutdown the supervisor stops accepting requests, waits for every live aggregator to
//! report and exits.

mod actor;
pub use actor::Supervisor;
mod config;
pub use config::Config;
mod ingress;
pub use ingress::{Mailbox, Task};
pub(crate) use ingress::Message;
mod metrics;
