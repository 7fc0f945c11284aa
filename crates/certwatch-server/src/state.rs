//! Shared state for HTTP handlers.

use std::sync::atomic::AtomicU64;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use certwatch_rules::SharedEngine;
use certwatch_store::{MatchSender, MatchStore, RecentCache};
use certwatch_types::CertwatchConfig;

/// Everything the handlers need, shared behind one `Arc`.
pub struct AppState {
    /// Atomically published rule engine, read per ingest.
    pub engine: SharedEngine,
    /// Store connection for queries (the pipeline writes on its own).
    pub store: Mutex<MatchStore>,
    /// In-memory ring of recent matches.
    pub recent: Arc<RecentCache>,
    /// Producer handle onto the match bus.
    pub matches_tx: MatchSender,
    /// Serializes every rules-admin mutation.
    pub admin_lock: tokio::sync::Mutex<()>,
    /// Certificates that matched at least one positive keyword.
    pub total_certs: AtomicU64,
    /// Rule firings published to the bus.
    pub total_matches: AtomicU64,
    pub started_at: Instant,
    pub config: CertwatchConfig,
}

impl AppState {
    pub fn new(
        engine: SharedEngine,
        store: MatchStore,
        recent: Arc<RecentCache>,
        matches_tx: MatchSender,
        config: CertwatchConfig,
    ) -> Self {
        Self {
            engine,
            store: Mutex::new(store),
            recent,
            matches_tx,
            admin_lock: tokio::sync::Mutex::new(()),
            total_certs: AtomicU64::new(0),
            total_matches: AtomicU64::new(0),
            started_at: Instant::now(),
            config,
        }
    }
}
