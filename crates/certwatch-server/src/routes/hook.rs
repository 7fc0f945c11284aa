//! Webhook ingest handler.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use certwatch_rules::idn;
use certwatch_types::{CertEvent, CertwatchError, Match};

use crate::routes::ApiError;
use crate::state::AppState;

/// `POST /hook` -- process one certificate event.
///
/// The response reports the number of positive keywords found, not the
/// number of rules fired; that is the monitor's ingestion contract. A full
/// match bus drops the record with a warning and still returns 200 -- the
/// endpoint stays available even when persistence is saturated.
pub async fn hook(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    if state.config.debug {
        debug!(bytes = body.len(), body = %String::from_utf8_lossy(&body), "raw webhook body");
    }

    let event: CertEvent = serde_json::from_slice(&body)
        .map_err(|e| CertwatchError::BadRequest(format!("invalid json: {e}")))?;

    let domains = idn::expand(&event.dns_names());

    let Some(engine) = state.engine.load() else {
        // No rules published yet; accept and skip processing.
        return Ok(Json(json!({ "status": "ok", "matches": 0 })));
    };

    let found = engine.find(&domains);
    if found.is_empty() {
        return Ok(Json(json!({ "status": "ok", "matches": 0 })));
    }

    state.total_certs.fetch_add(1, Ordering::Relaxed);

    if let Some(rule_match) = engine.evaluate(&found, &domains) {
        state.total_matches.fetch_add(1, Ordering::Relaxed);

        let record = Match {
            cert_id: event.id.clone(),
            domains: domains.clone(),
            keywords: rule_match.keywords.clone(),
            rule_name: rule_match.rule_name.clone(),
            priority: rule_match.priority,
            timestamp: Utc::now(),
            tbs_sha256: event.issuance.tbs_sha256.clone(),
            cert_sha256: event.issuance.cert_sha256.clone(),
        };

        info!(
            cert_id = %record.cert_id,
            rule = %record.rule_name,
            priority = %record.priority,
            keywords = ?record.keywords,
            "rule match"
        );

        // Non-blocking: a full bus already logged the drop.
        let _ = state.matches_tx.publish(record);
    }

    Ok(Json(json!({ "status": "ok", "matches": found.len() })))
}
