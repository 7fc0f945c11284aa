//! The match record flowing from ingest through the bus into the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::priority::Priority;

/// A rule firing on one certificate event.
///
/// Produced by the ingest handler, buffered on the match bus, copied into
/// the recent-cache ring, and persisted by the workers. `keywords` holds
/// the positive keywords the automaton actually observed for this event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Match {
    pub cert_id: String,
    /// Full expanded domain list of the event.
    pub domains: Vec<String>,
    /// Positive keywords found by the automaton, deduplicated.
    pub keywords: Vec<String>,
    /// Name of the rule that fired.
    pub rule_name: String,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    pub tbs_sha256: String,
    pub cert_sha256: String,
}
