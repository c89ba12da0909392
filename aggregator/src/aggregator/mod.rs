//! Aggregate signatures over a single message digest.
//!
//! # Overview
//!
//! An [Aggregator] owns one digest. On start it snapshots the operator set at the reference
//! block, then verifies signatures submitted through its [Mailbox] in arrival order, replying
//! with a verdict for each. Valid signatures from new signers are merged into the partial
//! aggregation. Once every requested quorum has crossed its threshold, the aggregator fetches the
//! verifier indices for the non-signers and emits the [Aggregation](crate::types::Aggregation).
//!
//! # Lifetime
//!
//! The aggregator emits exactly one [AggregationResult](crate::types::AggregationResult) and
//! exits. It ends with:
//! - success once every quorum crosses its threshold,
//! - [MessageExpired](crate::Error::MessageExpired) when its deadline passes first,
//! - [RegistryUnavailable](crate::Error::RegistryUnavailable) or
//!   [IndicesUnavailable](crate::Error::IndicesUnavailable) when the registry fails,
//! - [Cancelled](crate::Error::Cancelled) on shutdown.
//!
//! The deadline is `time_to_expiry` after start. When an `aggregation_timeout` is configured, the
//! first accepted signature pulls the deadline in to at most `aggregation_timeout` later.
//!
//! Signatures still queued when the aggregator exits are answered with
//! [MessageNotFound](crate::Error::MessageNotFound), as are any sent afterwards.

mod actor;
pub use actor::Aggregator;
mod config;
pub use config::Config;
mod ingress;
pub use ingress::{Mailbox, SignedDigest};
pub(crate) use ingress::Message;
mod partial;
pub use partial::threshold_met;
