//! MatchStore: SQLite-backed, date-partitioned match storage.

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use certwatch_types::{CertwatchError, Match};

/// Prefix shared by every partition table.
const PARTITION_PREFIX: &str = "matches_";

/// A date-partitioned match store backed by SQLite.
///
/// Each UTC calendar day gets its own `matches_YYYYMMDD` table, created
/// lazily on the first write for that day. Within a partition the
/// `(cert_id, keyword)` pair is unique and duplicate inserts are ignored,
/// which makes batch commits idempotent under worker retries.
pub struct MatchStore {
    conn: Connection,
}

impl MatchStore {
    /// Open (or create) the store at the given path.
    ///
    /// Enables WAL mode and a busy timeout, then runs the additive column
    /// migration over any partitions that already exist.
    pub fn open(path: &Path) -> Result<Self, CertwatchError> {
        let conn = Connection::open(path)
            .map_err(|e| CertwatchError::StoreError(format!("failed to open database: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| CertwatchError::StoreError(format!("failed to set WAL mode: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| CertwatchError::StoreError(format!("failed to set busy timeout: {e}")))?;

        let store = Self { conn };
        store.migrate_partitions()?;

        info!(path = %path.display(), "match store opened");
        Ok(store)
    }

    /// Create the partition for `date` if it does not exist. Idempotent.
    ///
    /// Returns the partition table name.
    pub fn ensure_partition(&self, date: NaiveDate) -> Result<String, CertwatchError> {
        let table = partition_name(date);
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    cert_id TEXT NOT NULL,
                    keyword TEXT NOT NULL,
                    rule_name TEXT NOT NULL DEFAULT '',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    domains TEXT NOT NULL,
                    tbs_sha256 TEXT,
                    cert_sha256 TEXT,
                    timestamp TEXT NOT NULL,
                    UNIQUE(cert_id, keyword)
                );
                CREATE INDEX IF NOT EXISTS {table}_idx_timestamp ON {table}(timestamp);
                CREATE INDEX IF NOT EXISTS {table}_idx_keyword ON {table}(keyword);
                CREATE INDEX IF NOT EXISTS {table}_idx_priority ON {table}(priority);"
            ))
            .map_err(|e| {
                CertwatchError::StoreError(format!("failed to create partition {table}: {e}"))
            })?;
        Ok(table)
    }

    /// Commit a batch of match records, partitioned by the UTC date of each
    /// record's timestamp.
    ///
    /// Each day's slice goes into its own transaction; each record inserts
    /// one row per matched keyword with `INSERT OR IGNORE`, so replaying a
    /// batch is harmless. Returns the number of rows actually inserted.
    pub fn store_batch(&mut self, records: &[Match]) -> Result<usize, CertwatchError> {
        if records.is_empty() {
            return Ok(0);
        }

        // Group records by partition date, preserving batch order.
        let mut by_date: Vec<(NaiveDate, Vec<&Match>)> = Vec::new();
        for record in records {
            let date = record.timestamp.date_naive();
            match by_date.iter().position(|(d, _)| *d == date) {
                Some(i) => by_date[i].1.push(record),
                None => by_date.push((date, vec![record])),
            }
        }

        let mut inserted = 0;
        for (date, bucket) in by_date {
            let table = self.ensure_partition(date)?;
            inserted += self.insert_batch(&table, &bucket)?;
        }
        Ok(inserted)
    }

    /// Insert a day's slice of records into one partition transactionally.
    fn insert_batch(&mut self, table: &str, records: &[&Match]) -> Result<usize, CertwatchError> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| CertwatchError::StoreError(format!("failed to begin batch: {e}")))?;

        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(&format!(
                    "INSERT OR IGNORE INTO {table}
                     (cert_id, keyword, rule_name, priority, domains, tbs_sha256, cert_sha256, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
                ))
                .map_err(|e| {
                    CertwatchError::StoreError(format!("failed to prepare insert: {e}"))
                })?;

            for record in records {
                let domains = serde_json::to_string(&record.domains).map_err(|e| {
                    CertwatchError::StoreError(format!("failed to encode domains: {e}"))
                })?;
                for keyword in &record.keywords {
                    inserted += stmt
                        .execute(params![
                            record.cert_id,
                            keyword,
                            record.rule_name,
                            record.priority.as_str(),
                            domains,
                            record.tbs_sha256,
                            record.cert_sha256,
                            record.timestamp.to_rfc3339(),
                        ])
                        .map_err(|e| {
                            CertwatchError::StoreError(format!("failed to insert row: {e}"))
                        })?;
                }
            }
        }

        tx.commit()
            .map_err(|e| CertwatchError::StoreError(format!("failed to commit batch: {e}")))?;
        debug!(table, rows = inserted, "committed match batch");
        Ok(inserted)
    }

    /// Every existing partition, as `(date, table_name)` sorted by date.
    ///
    /// Tables whose suffix does not parse as a date are ignored.
    pub fn existing_partitions(&self) -> Result<Vec<(NaiveDate, String)>, CertwatchError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT name FROM sqlite_master
                 WHERE type = 'table' AND name LIKE 'matches_%' ORDER BY name",
            )
            .map_err(|e| {
                CertwatchError::StoreError(format!("failed to list partitions: {e}"))
            })?;

        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| CertwatchError::StoreError(format!("failed to read partitions: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CertwatchError::StoreError(format!("failed to read partitions: {e}")))?;

        Ok(names
            .into_iter()
            .filter_map(|name| partition_date(&name).map(|date| (date, name)))
            .collect())
    }

    /// Drop every partition whose date is strictly before `cutoff`.
    ///
    /// Returns the number of partitions dropped.
    pub fn drop_older_than(&self, cutoff: NaiveDate) -> Result<usize, CertwatchError> {
        let mut dropped = 0;
        for (date, table) in self.existing_partitions()? {
            if date >= cutoff {
                continue;
            }
            self.conn
                .execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
                .map_err(|e| {
                    CertwatchError::StoreError(format!("failed to drop partition {table}: {e}"))
                })?;
            info!(table, %date, "dropped expired partition");
            dropped += 1;
        }
        Ok(dropped)
    }

    /// Retention cutoff helper: drop partitions older than today (UTC)
    /// minus `retention_days`.
    pub fn drop_expired(&self, retention_days: u32) -> Result<usize, CertwatchError> {
        let cutoff = Utc::now().date_naive() - chrono::Days::new(u64::from(retention_days));
        self.drop_older_than(cutoff)
    }

    /// Additive migration: bring partitions created by earlier schema
    /// versions up to date by attempting each column-add and ignoring the
    /// "duplicate column" failures.
    fn migrate_partitions(&self) -> Result<(), CertwatchError> {
        for (_, table) in self.existing_partitions()? {
            let _ = self.conn.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN rule_name TEXT NOT NULL DEFAULT ''"
            ));
            let _ = self.conn.execute_batch(&format!(
                "ALTER TABLE {table} ADD COLUMN priority TEXT NOT NULL DEFAULT 'medium'"
            ));
            let _ = self.conn.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS {table}_idx_priority ON {table}(priority)"
            ));
        }
        Ok(())
    }

    /// Cheap liveness probe used by the health endpoint.
    pub fn ping(&self) -> Result<(), CertwatchError> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| CertwatchError::StoreError(format!("ping failed: {e}")))
    }

    /// Read access for the query extensions in [`crate::query`].
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Partition table name for a UTC date, e.g. `matches_20260802`.
pub(crate) fn partition_name(date: NaiveDate) -> String {
    format!("{PARTITION_PREFIX}{}", date.format("%Y%m%d"))
}

/// Inverse of [`partition_name`]; `None` for foreign `matches_*` tables.
pub(crate) fn partition_date(table: &str) -> Option<NaiveDate> {
    let suffix = table.strip_prefix(PARTITION_PREFIX)?;
    NaiveDate::parse_from_str(suffix, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::test_db;
    use certwatch_types::Priority;
    use chrono::TimeZone;

    fn sample_match(cert_id: &str, keywords: &[&str]) -> Match {
        Match {
            cert_id: cert_id.to_string(),
            domains: vec![format!("{cert_id}.example")],
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            rule_name: "sample-rule".to_string(),
            priority: Priority::High,
            timestamp: Utc::now(),
            tbs_sha256: "aa".to_string(),
            cert_sha256: "bb".to_string(),
        }
    }

    #[test]
    fn partition_name_round_trips() {
        let date = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();
        let name = partition_name(date);
        assert_eq!(name, "matches_20260802");
        assert_eq!(partition_date(&name), Some(date));
        assert_eq!(partition_date("matches_other"), None);
    }

    #[test]
    fn ensure_partition_is_idempotent() {
        let (_tmp, store) = test_db();
        let date = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();
        let a = store.ensure_partition(date).unwrap();
        let b = store.ensure_partition(date).unwrap();
        assert_eq!(a, b);
        assert_eq!(store.existing_partitions().unwrap().len(), 1);
    }

    #[test]
    fn duplicate_cert_keyword_pair_inserts_once() {
        let (_tmp, mut store) = test_db();
        let m = sample_match("c1", &["paypal", "login"]);
        assert_eq!(store.store_batch(&[m.clone()]).unwrap(), 2);
        // Replaying the same record inserts nothing new.
        assert_eq!(store.store_batch(&[m]).unwrap(), 0);
    }

    #[test]
    fn batch_splits_across_dates() {
        let (_tmp, mut store) = test_db();
        let mut yesterday = sample_match("c1", &["paypal"]);
        yesterday.timestamp = Utc.with_ymd_and_hms(2026, 8, 1, 23, 59, 0).unwrap();
        let mut today = sample_match("c2", &["paypal"]);
        today.timestamp = Utc.with_ymd_and_hms(2026, 8, 2, 0, 1, 0).unwrap();

        store.store_batch(&[yesterday, today]).unwrap();

        let partitions = store.existing_partitions().unwrap();
        assert_eq!(partitions.len(), 2);
        assert_eq!(partitions[0].1, "matches_20260801");
        assert_eq!(partitions[1].1, "matches_20260802");
    }

    #[test]
    fn drop_older_than_is_strict() {
        let (_tmp, store) = test_db();
        for day in 1..=3 {
            store
                .ensure_partition(NaiveDate::from_ymd_opt(2026, 8, day).unwrap())
                .unwrap();
        }

        let cutoff = NaiveDate::from_ymd_opt(2026, 8, 2).unwrap();
        let dropped = store.drop_older_than(cutoff).unwrap();
        assert_eq!(dropped, 1);

        let remaining: Vec<String> = store
            .existing_partitions()
            .unwrap()
            .into_iter()
            .map(|(_, t)| t)
            .collect();
        // The cutoff day itself survives.
        assert_eq!(remaining, vec!["matches_20260802", "matches_20260803"]);
    }

    #[test]
    fn migration_adds_missing_columns() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        {
            // Simulate a partition created by an older schema version.
            let conn = Connection::open(tmp.path()).unwrap();
            conn.execute_batch(
                "CREATE TABLE matches_20260101 (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    cert_id TEXT NOT NULL,
                    keyword TEXT NOT NULL,
                    domains TEXT NOT NULL,
                    tbs_sha256 TEXT,
                    cert_sha256 TEXT,
                    timestamp TEXT NOT NULL,
                    UNIQUE(cert_id, keyword)
                );",
            )
            .unwrap();
            conn.execute(
                "INSERT INTO matches_20260101 (cert_id, keyword, domains, timestamp)
                 VALUES ('c1', 'paypal', '[]', '2026-01-01 10:00:00')",
                [],
            )
            .unwrap();
        }

        // Reopening migrates; legacy rows read back with column defaults.
        let store = MatchStore::open(tmp.path()).unwrap();
        let rows = store
            .list_since(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap())
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].rule_name, "");
        assert_eq!(rows[0].priority, Priority::Medium);

        // Opening again must not fail on the already-added columns.
        drop(store);
        MatchStore::open(tmp.path()).unwrap();
    }
}
