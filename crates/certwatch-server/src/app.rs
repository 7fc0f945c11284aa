//! Router assembly.

use std::sync::Arc;

use axum::routing::{delete, get, post, put};
use axum::Router;

use crate::routes::{hook, matches, rules, system};
use crate::state::AppState;

/// Build the full application router.
///
/// Method routing doubles as the 405 guard: a GET against `/hook` or a
/// POST against `/rules` is rejected with `405 Method Not Allowed` before
/// any handler runs.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/hook", post(hook::hook))
        .route("/matches", get(matches::in_memory))
        .route("/matches/recent", get(matches::recent))
        .route("/matches/clear", post(matches::clear))
        .route("/rules", get(rules::list))
        .route("/rules/create", post(rules::create))
        .route("/rules/update/{name}", put(rules::update))
        .route("/rules/delete/{name}", delete(rules::delete))
        .route("/rules/toggle/{name}", put(rules::toggle))
        .route("/rules/reload", post(rules::reload))
        .route("/health", get(system::health))
        .route("/metrics", get(system::metrics))
        .with_state(state)
}
