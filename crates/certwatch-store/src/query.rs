//! Query interface over the partitioned match tables.

use chrono::{DateTime, Utc};
use rusqlite::params;

use certwatch_types::{CertwatchError, Priority};

use crate::row::{parse_domains, parse_timestamp, MatchRow};
use crate::store::MatchStore;

/// Column list for match row queries (must match `read_row` field order).
const ROW_COLUMNS: &str =
    "cert_id, keyword, rule_name, priority, domains, tbs_sha256, cert_sha256, timestamp";

/// One page of cert-grouped results plus the total distinct-cert count.
#[derive(Debug)]
pub struct PaginatedMatches {
    /// One row per cert_id in the requested window, newest first.
    pub rows: Vec<MatchRow>,
    /// Distinct cert_ids across all partitions in the window.
    pub total: usize,
}

impl MatchStore {
    /// All rows with `timestamp >= since`, unioned across the partitions
    /// whose date can contain them.
    ///
    /// Rows are filtered after timestamp parsing so partitions written with
    /// legacy timestamp formats still participate correctly.
    pub fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<MatchRow>, CertwatchError> {
        let since_date = since.date_naive();
        let mut all = Vec::new();

        for (date, table) in self.existing_partitions()? {
            if date < since_date {
                continue;
            }
            let mut stmt = self
                .connection()
                .prepare(&format!("SELECT {ROW_COLUMNS} FROM {table}"))
                .map_err(|e| {
                    CertwatchError::StoreError(format!("list_since prepare failed: {e}"))
                })?;

            let rows = stmt
                .query_map([], read_row)
                .map_err(|e| CertwatchError::StoreError(format!("list_since failed: {e}")))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| CertwatchError::StoreError(format!("list_since read failed: {e}")))?;

            all.extend(rows.into_iter().filter(|row| row.timestamp >= since));
        }

        Ok(all)
    }

    /// Cert-grouped page of matches with `timestamp >= since`.
    ///
    /// Each cert_id appears once with its newest timestamp, ordered newest
    /// first with cert_id as tiebreaker; `total` is the sum of distinct
    /// cert counts across partitions.
    pub fn list_paginated(
        &self,
        since: DateTime<Utc>,
        limit: usize,
        offset: usize,
    ) -> Result<PaginatedMatches, CertwatchError> {
        let since_date = since.date_naive();
        let since_str = since.to_rfc3339();

        let tables: Vec<String> = self
            .existing_partitions()?
            .into_iter()
            .filter(|(date, _)| *date >= since_date)
            .map(|(_, table)| table)
            .collect();

        if tables.is_empty() {
            return Ok(PaginatedMatches {
                rows: Vec::new(),
                total: 0,
            });
        }

        let mut total = 0usize;
        for table in &tables {
            let count: i64 = self
                .connection()
                .query_row(
                    &format!(
                        "SELECT COUNT(DISTINCT cert_id) FROM {table} WHERE timestamp >= ?1"
                    ),
                    params![since_str],
                    |row| row.get(0),
                )
                .map_err(|e| {
                    CertwatchError::StoreError(format!("paginated count failed: {e}"))
                })?;
            total += count as usize;
        }

        let union = tables
            .iter()
            .map(|table| {
                format!(
                    "SELECT {ROW_COLUMNS_GROUPED} FROM {table}
                     WHERE timestamp >= ?1 GROUP BY cert_id"
                )
            })
            .collect::<Vec<_>>()
            .join(" UNION ALL ");
        let sql = format!(
            "SELECT {ROW_COLUMNS} FROM ({union})
             ORDER BY timestamp DESC, cert_id ASC LIMIT ?2 OFFSET ?3"
        );

        let mut stmt = self.connection().prepare(&sql).map_err(|e| {
            CertwatchError::StoreError(format!("paginated prepare failed: {e}"))
        })?;

        let rows = stmt
            .query_map(params![since_str, limit as i64, offset as i64], read_row)
            .map_err(|e| CertwatchError::StoreError(format!("paginated query failed: {e}")))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CertwatchError::StoreError(format!("paginated read failed: {e}")))?;

        Ok(PaginatedMatches { rows, total })
    }

    /// Every row for the given cert ids, across all existing partitions.
    pub fn list_by_cert_ids(&self, cert_ids: &[String]) -> Result<Vec<MatchRow>, CertwatchError> {
        if cert_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (1..=cert_ids.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(",");
        let param_refs: Vec<&dyn rusqlite::types::ToSql> =
            cert_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();

        let mut all = Vec::new();
        for (_, table) in self.existing_partitions()? {
            let mut stmt = self
                .connection()
                .prepare(&format!(
                    "SELECT {ROW_COLUMNS} FROM {table} WHERE cert_id IN ({placeholders})"
                ))
                .map_err(|e| {
                    CertwatchError::StoreError(format!("by_cert_ids prepare failed: {e}"))
                })?;

            let rows = stmt
                .query_map(param_refs.as_slice(), read_row)
                .map_err(|e| CertwatchError::StoreError(format!("by_cert_ids failed: {e}")))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| {
                    CertwatchError::StoreError(format!("by_cert_ids read failed: {e}"))
                })?;

            all.extend(rows);
        }
        Ok(all)
    }
}

/// Grouped column list for the pagination inner query: newest timestamp
/// per cert_id, the other columns taken from an arbitrary row of the group.
const ROW_COLUMNS_GROUPED: &str =
    "cert_id, keyword, rule_name, priority, domains, tbs_sha256, cert_sha256, MAX(timestamp) AS timestamp";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MatchRow> {
    Ok(MatchRow {
        cert_id: row.get(0)?,
        keyword: row.get(1)?,
        rule_name: row.get(2)?,
        priority: Priority::parse(&row.get::<_, String>(3)?),
        domains: parse_domains(&row.get::<_, String>(4)?),
        tbs_sha256: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        cert_sha256: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        timestamp: parse_timestamp(&row.get::<_, String>(7)?),
    })
}
