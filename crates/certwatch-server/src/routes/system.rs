//! Health and metrics handlers.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// `GET /health` -- 200 when the store answers and an engine is published.
pub async fn health(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<serde_json::Value>) {
    let store_ok = {
        let store = state.store.lock().unwrap_or_else(|e| e.into_inner());
        store.ping().is_ok()
    };
    if !store_ok {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": "store unreachable" })),
        );
    }

    let Some(engine) = state.engine.load() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": "rule engine not loaded" })),
        );
    };

    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "rules": engine.rules().len(),
            "keywords": engine.keyword_count(),
            "uptime": state.started_at.elapsed().as_secs(),
        })),
    )
}

/// `GET /metrics` -- counters and queue/engine gauges.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let (rules_count, keyword_count) = match state.engine.load() {
        Some(engine) => (engine.rules().len(), engine.keyword_count()),
        None => (0, 0),
    };

    Json(json!({
        "queue_len": state.matches_tx.queue_len(),
        "total_certs": state.total_certs.load(Ordering::Relaxed),
        "total_matches": state.total_matches.load(Ordering::Relaxed),
        "watched_keywords": keyword_count,
        "rules_count": rules_count,
        "recent_matches": state.recent.len(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    }))
}
