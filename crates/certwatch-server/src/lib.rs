//! HTTP surface for certwatch.
//!
//! Exposes the webhook ingest endpoint, match queries, the rules admin
//! API, and health/metrics. Routing and handlers live here; process
//! lifecycle (startup wiring, retention sweeper, graceful shutdown) is in
//! the `certwatch` binary.

pub mod app;
pub mod retention;
pub mod routes;
pub mod state;

pub use app::router;
pub use state::AppState;
