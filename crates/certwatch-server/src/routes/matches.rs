//! Match query handlers.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use certwatch_store::MatchRow;
use certwatch_types::{CertwatchError, Match, Priority};

use crate::routes::ApiError;
use crate::state::AppState;

/// Query parameters for `GET /matches/recent`.
#[derive(Debug, Deserialize)]
pub struct RecentParams {
    /// Look-back window in minutes (default 5).
    pub minutes: Option<i64>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// One cert-grouped match as the UI consumes it.
#[derive(Debug, Serialize)]
pub struct UiMatch {
    pub dns_names: Vec<String>,
    /// The keyword samples that matched for this certificate.
    pub matched_domains: Vec<String>,
    pub matched_rule: String,
    pub priority: Priority,
    pub tbs_sha256: String,
    pub cert_sha256: String,
    pub detected_at: DateTime<Utc>,
}

/// `GET /matches/recent` -- matches from the store within the window.
///
/// Without `limit`/`offset` the full window is returned; with either, the
/// result is windowed over distinct cert ids and the response carries
/// pagination metadata.
pub async fn recent(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecentParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let minutes = params.minutes.unwrap_or(5);
    if minutes < 0 {
        return Err(CertwatchError::BadRequest("bad minutes value".into()).into());
    }
    let since = Utc::now() - Duration::minutes(minutes);

    let paginate = params.limit.is_some() || params.offset.is_some();
    let limit = params.limit.unwrap_or(50);
    let offset = params.offset.unwrap_or(0);

    if paginate {
        let (page_rows, total) = {
            let store = state.store.lock().unwrap_or_else(|e| e.into_inner());
            let page = store.list_paginated(since, limit, offset)?;
            // The page has one row per cert; refetch every keyword row for
            // those certs so the grouped response is complete.
            let cert_ids: Vec<String> =
                page.rows.iter().map(|r| r.cert_id.clone()).collect();
            let full_rows = if cert_ids.is_empty() {
                Vec::new()
            } else {
                store.list_by_cert_ids(&cert_ids)?
            };
            (full_rows, page.total)
        };

        let matches = group_rows(page_rows);
        let count = matches.len();
        Ok(Json(json!({
            "count": count,
            "total": total,
            "limit": limit,
            "offset": offset,
            "has_more": offset + count < total,
            "matches": matches,
        })))
    } else {
        let rows = {
            let store = state.store.lock().unwrap_or_else(|e| e.into_inner());
            store.list_since(since)?
        };
        let matches = group_rows(rows);
        Ok(Json(json!({ "count": matches.len(), "matches": matches })))
    }
}

/// `GET /matches` -- snapshot of the in-memory recent ring.
pub async fn in_memory(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let matches = group_records(state.recent.snapshot());
    Json(json!({ "count": matches.len(), "matches": matches }))
}

/// `POST /matches/clear` -- empty the in-memory ring.
pub async fn clear(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.recent.clear();
    Json(json!({ "status": "cleared" }))
}

/// Group store rows (one per keyword) into one entry per cert_id.
fn group_rows(rows: Vec<MatchRow>) -> Vec<UiMatch> {
    let mut grouped: BTreeMap<String, UiMatch> = BTreeMap::new();
    for row in rows {
        match grouped.entry(row.cert_id.clone()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if !existing.matched_domains.contains(&row.keyword) {
                    existing.matched_domains.push(row.keyword);
                }
                if row.timestamp > existing.detected_at {
                    existing.detected_at = row.timestamp;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(UiMatch {
                    dns_names: row.domains,
                    matched_domains: vec![row.keyword],
                    matched_rule: row.rule_name,
                    priority: row.priority,
                    tbs_sha256: row.tbs_sha256,
                    cert_sha256: row.cert_sha256,
                    detected_at: row.timestamp,
                });
            }
        }
    }
    let mut matches: Vec<UiMatch> = grouped.into_values().collect();
    matches.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
    matches
}

/// Group in-memory records (already one per rule firing) by cert_id.
fn group_records(records: Vec<Match>) -> Vec<UiMatch> {
    let mut grouped: BTreeMap<String, UiMatch> = BTreeMap::new();
    for record in records {
        match grouped.entry(record.cert_id.clone()) {
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                for keyword in record.keywords {
                    if !existing.matched_domains.contains(&keyword) {
                        existing.matched_domains.push(keyword);
                    }
                }
                if record.timestamp > existing.detected_at {
                    existing.detected_at = record.timestamp;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(UiMatch {
                    dns_names: record.domains,
                    matched_domains: record.keywords,
                    matched_rule: record.rule_name,
                    priority: record.priority,
                    tbs_sha256: record.tbs_sha256,
                    cert_sha256: record.cert_sha256,
                    detected_at: record.timestamp,
                });
            }
        }
    }
    let mut matches: Vec<UiMatch> = grouped.into_values().collect();
    matches.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
    matches
}
