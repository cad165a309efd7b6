//! Kafka message router.
//!
//! Every configured route consumes its source topics and forwards matching
//! records to a destination topic. A route either checks one payload field
//! against a static allow-list, or correlates records by fingerprint: a
//! reference ingestor learns fingerprints from the route's reference topics
//! and the route forwards source records whose fingerprint was already seen.
//!
//! ## Error logging
//!
//! Log `anyhow::Error` chains with `{e:#}` so root causes stay visible.
//! Library errors carry their source in the message, so `error = %e` is
//! enough for them.

pub mod config;
pub mod fingerprint;
pub mod kafka;
pub mod metrics_consts;
pub mod record;
pub mod routing;
pub mod service;
pub mod store;
pub mod test_utils;

pub use fingerprint::{fingerprint, FieldPath, Fingerprint, FingerprintError};
pub use routing::{MatchStrategy, Route};
pub use store::MatchStore;
