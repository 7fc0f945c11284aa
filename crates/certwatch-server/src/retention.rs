//! Periodic retention sweeper for expired partitions.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use certwatch_store::MatchStore;
use certwatch_types::CertwatchError;

/// Spawn the retention sweeper.
///
/// Every `interval_hours` the sweeper drops partitions whose date is
/// strictly older than today (UTC) minus `retention_days`. The task is
/// cancellable between ticks through the shutdown channel.
pub fn spawn_sweeper(
    db_path: std::path::PathBuf,
    retention_days: u32,
    interval_hours: u64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(interval_hours.max(1) * 3600));
        // The first tick fires immediately: sweep once at startup.
        info!(
            retention_days,
            interval_hours, "partition retention sweeper started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = sweep(&db_path, retention_days) {
                        warn!(error = %e, "partition cleanup failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("retention sweeper stopping");
                    return;
                }
            }
        }
    })
}

/// One sweep: open a connection, drop expired partitions.
fn sweep(db_path: &std::path::Path, retention_days: u32) -> Result<(), CertwatchError> {
    let store = MatchStore::open(db_path)?;
    let dropped = store.drop_expired(retention_days)?;
    if dropped > 0 {
        info!(dropped, "expired partitions removed");
    }
    Ok(())
}
