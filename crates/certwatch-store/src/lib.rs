//! SQLite-backed, date-partitioned storage for certificate matches.
//!
//! Matches live in one table per UTC calendar day, created lazily on the
//! first write for that day and dropped by the retention sweeper once they
//! age out. Ingest publishes onto a bounded bus; a pool of workers batches
//! records, copies them into the in-memory recent ring, and commits each
//! day's slice in a single transaction.

pub mod pipeline;
pub mod query;
pub mod recent;
pub mod row;
pub mod store;

pub use pipeline::{MatchPipeline, MatchSender, PipelineConfig};
pub use query::PaginatedMatches;
pub use recent::RecentCache;
pub use row::MatchRow;
pub use store::MatchStore;

#[cfg(test)]
pub(crate) mod test_helpers {
    use crate::store::MatchStore;
    use tempfile::NamedTempFile;

    /// Create a temporary database file and open a MatchStore on it.
    ///
    /// Returns both the handle (to keep the file alive) and the store.
    pub fn test_db() -> (NamedTempFile, MatchStore) {
        let tmp = NamedTempFile::new().expect("failed to create temp file");
        let store = MatchStore::open(tmp.path()).expect("failed to open store");
        (tmp, store)
    }
}
