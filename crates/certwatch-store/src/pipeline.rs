//! Match bus and persistence worker pool.
//!
//! Ingest publishes [`Match`] records onto a bounded mpsc channel with a
//! non-blocking send; when the bus is full the record is dropped with a
//! warning, keeping the webhook endpoint available over individual alert
//! durability. A pool of workers drains the bus, copies each record into
//! the recent-cache ring, and flushes batches to the store when either the
//! batch fills or the batch timeout elapses. Store errors are logged per
//! batch and never stall the pipeline. Closing the bus makes every worker
//! flush its remainder once and exit.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use certwatch_types::{CertwatchError, Match};

use crate::recent::RecentCache;
use crate::store::MatchStore;

/// Default bounded bus capacity.
const DEFAULT_BUS_CAPACITY: usize = 10_000;

/// Default worker pool size.
const DEFAULT_WORKERS: usize = 4;

/// Default records per batch commit.
const DEFAULT_BATCH_SIZE: usize = 200;

/// Default flush timeout when a batch is not full.
const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(200);

/// Configuration for the persistence pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Bounded bus capacity; a full bus drops new records.
    pub bus_capacity: usize,
    /// Number of worker tasks draining the bus.
    pub workers: usize,
    /// Flush once this many records accumulate.
    pub batch_size: usize,
    /// Flush whatever accumulated after this long without filling a batch.
    pub batch_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_BUS_CAPACITY,
            workers: DEFAULT_WORKERS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_timeout: DEFAULT_BATCH_TIMEOUT,
        }
    }
}

/// Producer handle onto the match bus.
#[derive(Clone)]
pub struct MatchSender {
    tx: mpsc::Sender<Match>,
}

impl MatchSender {
    /// Publish a match without blocking.
    ///
    /// # Errors
    ///
    /// [`CertwatchError::BusFull`] when the bus is at capacity (the record
    /// is dropped) or when the pipeline has already shut down.
    pub fn publish(&self, record: Match) -> Result<(), CertwatchError> {
        self.tx.try_send(record).map_err(|e| match e {
            mpsc::error::TrySendError::Full(m) => {
                warn!(
                    cert_id = %m.cert_id,
                    rule = %m.rule_name,
                    "match bus full, dropping match"
                );
                CertwatchError::BusFull
            }
            mpsc::error::TrySendError::Closed(m) => {
                warn!(cert_id = %m.cert_id, "match bus closed, dropping match");
                CertwatchError::BusFull
            }
        })
    }

    /// Records currently buffered on the bus.
    pub fn queue_len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// The running persistence pipeline: bus plus worker pool.
pub struct MatchPipeline {
    tx: mpsc::Sender<Match>,
    handles: Vec<JoinHandle<()>>,
}

impl MatchPipeline {
    /// Start the worker pool over the given store and recent ring.
    pub fn start(store: MatchStore, recent: Arc<RecentCache>, config: PipelineConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.bus_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let store = Arc::new(Mutex::new(store));

        let workers = config.workers.max(1);
        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&rx),
                    Arc::clone(&store),
                    Arc::clone(&recent),
                    config.batch_size,
                    config.batch_timeout,
                ))
            })
            .collect();

        info!(
            workers,
            capacity = config.bus_capacity,
            batch_size = config.batch_size,
            batch_timeout_ms = config.batch_timeout.as_millis() as u64,
            "persistence pipeline started"
        );

        Self { tx, handles }
    }

    /// A cloneable producer handle.
    pub fn sender(&self) -> MatchSender {
        MatchSender {
            tx: self.tx.clone(),
        }
    }

    /// Close the bus and wait for every worker to flush its remainder and
    /// exit.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "persistence worker panicked");
            }
        }
        info!("persistence pipeline shut down");
    }
}

/// One worker: drain the shared receiver, batch, and flush.
async fn worker_loop(
    id: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Match>>>,
    store: Arc<Mutex<MatchStore>>,
    recent: Arc<RecentCache>,
    batch_size: usize,
    batch_timeout: Duration,
) {
    let mut batch: Vec<Match> = Vec::with_capacity(batch_size);

    loop {
        let received = tokio::time::timeout(batch_timeout, async {
            rx.lock().await.recv().await
        })
        .await;

        match received {
            Ok(Some(record)) => {
                // The ring sees the record before commit so the UI can show
                // it while the batch is still in flight.
                recent.push(record.clone());
                batch.push(record);
                if batch.len() >= batch_size {
                    flush(id, &store, &mut batch);
                }
            }
            Ok(None) => {
                // Bus closed: final flush, then exit.
                flush(id, &store, &mut batch);
                info!(worker = id, "persistence worker drained and exiting");
                return;
            }
            Err(_elapsed) => {
                flush(id, &store, &mut batch);
            }
        }
    }
}

/// Commit the batch, logging failures without stalling the worker.
fn flush(id: usize, store: &Arc<Mutex<MatchStore>>, batch: &mut Vec<Match>) {
    if batch.is_empty() {
        return;
    }
    let count = batch.len();
    let mut store = store.lock().unwrap_or_else(|e| e.into_inner());
    match store.store_batch(batch) {
        Ok(rows) => {
            tracing::debug!(worker = id, records = count, rows, "flushed match batch");
        }
        Err(e) => {
            error!(worker = id, records = count, error = %e, "match batch flush failed, continuing");
        }
    }
    batch.clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MatchStore;
    use certwatch_types::Priority;
    use chrono::Utc;
    use tempfile::NamedTempFile;

    fn record(cert_id: &str) -> Match {
        Match {
            cert_id: cert_id.to_string(),
            domains: vec![format!("{cert_id}.example")],
            keywords: vec!["paypal".to_string()],
            rule_name: "r".to_string(),
            priority: Priority::High,
            timestamp: Utc::now(),
            tbs_sha256: String::new(),
            cert_sha256: String::new(),
        }
    }

    fn tmp_store() -> (NamedTempFile, MatchStore) {
        let tmp = NamedTempFile::new().unwrap();
        let store = MatchStore::open(tmp.path()).unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn published_matches_reach_store_and_ring() {
        let (tmp, store) = tmp_store();
        let recent = Arc::new(RecentCache::default());
        let pipeline = MatchPipeline::start(store, Arc::clone(&recent), PipelineConfig::default());
        let sender = pipeline.sender();

        let before = Utc::now() - chrono::Duration::minutes(1);
        for i in 0..10 {
            sender.publish(record(&format!("c{i}"))).unwrap();
        }
        pipeline.shutdown().await;

        assert_eq!(recent.len(), 10);
        let reader = MatchStore::open(tmp.path()).unwrap();
        assert_eq!(reader.list_since(before).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn shutdown_drains_unflushed_batches() {
        let (tmp, store) = tmp_store();
        let recent = Arc::new(RecentCache::default());
        let config = PipelineConfig {
            // Neither size nor timer can flush before shutdown.
            batch_size: 10_000,
            batch_timeout: Duration::from_secs(600),
            ..Default::default()
        };
        let pipeline = MatchPipeline::start(store, recent, config);
        let sender = pipeline.sender();

        let before = Utc::now() - chrono::Duration::minutes(1);
        for i in 0..50 {
            sender.publish(record(&format!("c{i}"))).unwrap();
        }
        pipeline.shutdown().await;

        let reader = MatchStore::open(tmp.path()).unwrap();
        assert_eq!(
            reader.list_since(before).unwrap().len(),
            50,
            "all records must be flushed on close"
        );
    }

    #[tokio::test]
    async fn full_bus_drops_newest_and_keeps_the_rest() {
        let (tmp, store) = tmp_store();
        let recent = Arc::new(RecentCache::default());
        let config = PipelineConfig {
            bus_capacity: 2,
            workers: 1,
            batch_size: 10_000,
            // Workers never drain during the test window.
            batch_timeout: Duration::from_secs(600),
        };
        let pipeline = MatchPipeline::start(store, recent, config);
        let sender = pipeline.sender();

        // On the single-threaded test runtime the worker cannot run between
        // these sends, so exactly the bus capacity fits and the third send
        // hits the drop policy.
        let before = Utc::now() - chrono::Duration::minutes(1);
        sender.publish(record("c0")).unwrap();
        sender.publish(record("c1")).unwrap();
        let err = sender.publish(record("c2")).unwrap_err();
        assert!(matches!(err, CertwatchError::BusFull));

        pipeline.shutdown().await;

        // The two accepted records survive; the dropped one does not.
        let reader = MatchStore::open(tmp.path()).unwrap();
        let rows = reader.list_since(before).unwrap();
        let mut certs: Vec<String> = rows.into_iter().map(|r| r.cert_id).collect();
        certs.sort();
        assert_eq!(certs, vec!["c0", "c1"]);
    }

    #[tokio::test]
    async fn timer_flushes_partial_batches() {
        let (tmp, store) = tmp_store();
        let recent = Arc::new(RecentCache::default());
        let config = PipelineConfig {
            batch_size: 10_000,
            batch_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let pipeline = MatchPipeline::start(store, recent, config);
        let sender = pipeline.sender();

        let before = Utc::now() - chrono::Duration::minutes(1);
        sender.publish(record("c1")).unwrap();

        tokio::time::sleep(Duration::from_millis(300)).await;

        let reader = MatchStore::open(tmp.path()).unwrap();
        assert_eq!(
            reader.list_since(before).unwrap().len(),
            1,
            "record should be flushed by the timeout"
        );

        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn sender_reports_queue_length() {
        let (_tmp, store) = tmp_store();
        let recent = Arc::new(RecentCache::default());
        let config = PipelineConfig {
            bus_capacity: 8,
            workers: 1,
            batch_size: 10_000,
            batch_timeout: Duration::from_secs(600),
        };
        let pipeline = MatchPipeline::start(store, recent, config);
        let sender = pipeline.sender();
        // Length is approximate while a worker drains, but bounded by sends.
        sender.publish(record("c1")).unwrap();
        assert!(sender.queue_len() <= 1);
        pipeline.shutdown().await;
    }
}
