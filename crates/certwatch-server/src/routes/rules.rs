//! Rules admin handlers.
//!
//! Every mutation follows the same discipline: take the admin lock (one
//! writer at a time), round-trip the rule file through structured YAML,
//! rebuild the engine from the rewritten file, and atomically publish it.
//! A failed rebuild leaves both the file error visible and the previously
//! published engine untouched -- reloads are never destructive.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use tracing::info;

use certwatch_rules::{compile_rules, load_rules, RuleConfig, RuleFile};
use certwatch_types::CertwatchError;

use crate::routes::ApiError;
use crate::state::AppState;

/// `GET /rules` -- the current engine's rules, in evaluation order.
pub async fn list(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let Some(engine) = state.engine.load() else {
        return Json(json!({ "rules": [], "count": 0 }));
    };

    let rules: Vec<serde_json::Value> = engine
        .rules()
        .iter()
        .map(|r| {
            json!({
                "name": r.name,
                "keywords": r.raw_keywords,
                "priority": r.priority,
                "enabled": r.enabled,
                "order": r.order,
                "comment": r.comment,
            })
        })
        .collect();

    Json(json!({ "count": rules.len(), "rules": rules }))
}

/// `POST /rules/create` -- append a rule; duplicate names are rejected.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(new_rule): Json<RuleConfig>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _guard = state.admin_lock.lock().await;

    let mut file = RuleFile::load(&state.config.rules_path)?;
    if file.rules.iter().any(|r| r.name == new_rule.name) {
        return Err(CertwatchError::DuplicateRule(new_rule.name).into());
    }
    file.rules.push(new_rule);

    save_and_publish(&state, &file)?;
    Ok(Json(json!({ "status": "rule created" })))
}

/// `PUT /rules/update/{name}` -- replace a rule by name.
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(updated): Json<RuleConfig>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _guard = state.admin_lock.lock().await;

    let mut file = RuleFile::load(&state.config.rules_path)?;
    let slot = file
        .rules
        .iter_mut()
        .find(|r| r.name == name)
        .ok_or(CertwatchError::RuleNotFound(name))?;
    *slot = updated;

    save_and_publish(&state, &file)?;
    Ok(Json(json!({ "status": "rule updated" })))
}

/// `DELETE /rules/delete/{name}` -- remove a rule by name.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _guard = state.admin_lock.lock().await;

    let mut file = RuleFile::load(&state.config.rules_path)?;
    let before = file.rules.len();
    file.rules.retain(|r| r.name != name);
    if file.rules.len() == before {
        return Err(CertwatchError::RuleNotFound(name).into());
    }

    save_and_publish(&state, &file)?;
    Ok(Json(json!({ "status": "rule deleted" })))
}

/// `PUT /rules/toggle/{name}` -- flip a rule's enabled flag.
pub async fn toggle(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _guard = state.admin_lock.lock().await;

    let mut file = RuleFile::load(&state.config.rules_path)?;
    let slot = file
        .rules
        .iter_mut()
        .find(|r| r.name == name)
        .ok_or(CertwatchError::RuleNotFound(name))?;
    slot.enabled = !slot.enabled;
    let enabled = slot.enabled;

    save_and_publish(&state, &file)?;
    Ok(Json(json!({ "status": "rule toggled", "enabled": enabled })))
}

/// `POST /rules/reload` -- re-read the file, rebuild, publish.
pub async fn reload(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let _guard = state.admin_lock.lock().await;

    let engine = load_rules(&state.config.rules_path)?;
    let loaded = engine.rules().len();
    let enabled = engine.enabled_count();
    state.engine.publish(engine);

    info!(rules = loaded, enabled, "rules reloaded");
    Ok(Json(json!({
        "status": "rules reloaded",
        "rules_loaded": loaded,
        "enabled_rules": enabled,
    })))
}

/// Validate the rewritten document, persist it, and publish the engine.
///
/// Compilation happens before the write so an invalid mutation is rejected
/// without touching the file on disk, and the previously published engine
/// stays in place.
fn save_and_publish(state: &AppState, file: &RuleFile) -> Result<(), CertwatchError> {
    let engine = compile_rules(file)?;
    file.save(&state.config.rules_path)?;
    info!(
        rules = engine.rules().len(),
        enabled = engine.enabled_count(),
        keywords = engine.keyword_count(),
        "rule file rewritten, engine published"
    );
    state.engine.publish(engine);
    Ok(())
}
