//! certwatch -- real-time CT-log phishing detector.
//!
//! Startup order matters: store first (today's partition ensured), then
//! rules (engine published before the listener accepts webhooks), then the
//! persistence pipeline, then the retention sweeper, then the HTTP server.
//! Shutdown reverses it: stop accepting requests, close the match bus,
//! wait a bounded deadline for the workers to drain.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use certwatch_rules::{load_rules, SharedEngine};
use certwatch_server::{router, AppState};
use certwatch_store::{MatchPipeline, MatchStore, PipelineConfig, RecentCache};
use certwatch_types::CertwatchConfig;

/// How long shutdown waits for the persistence workers to drain.
const DRAIN_DEADLINE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = CertwatchConfig::from_env();
    if config.debug {
        info!("debug mode enabled, raw webhook payloads will be logged");
    }

    if let Some(data_dir) = config.db_path.parent() {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    }

    // Store: open, ensure today's partition, and a separate reader
    // connection for queries.
    let pipeline_store = MatchStore::open(&config.db_path).context("failed to open store")?;
    pipeline_store
        .ensure_partition(Utc::now().date_naive())
        .context("failed to create today's partition")?;
    let query_store = MatchStore::open(&config.db_path).context("failed to open query store")?;

    // Rules: load and publish before accepting webhooks.
    let engine = SharedEngine::new();
    let initial = load_rules(&config.rules_path).context("failed to load rules")?;
    info!(
        rules = initial.rules().len(),
        enabled = initial.enabled_count(),
        keywords = initial.keyword_count(),
        "initial rule set loaded"
    );
    engine.publish(initial);

    // Persistence pipeline.
    let recent = Arc::new(RecentCache::default());
    let pipeline = MatchPipeline::start(
        pipeline_store,
        Arc::clone(&recent),
        PipelineConfig::default(),
    );

    // Retention sweeper.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = certwatch_server::retention::spawn_sweeper(
        config.db_path.clone(),
        config.retention_days,
        config.cleanup_interval_hours,
        shutdown_rx.clone(),
    );

    let state = Arc::new(AppState::new(
        engine,
        query_store,
        recent,
        pipeline.sender(),
        config.clone(),
    ));
    let app = router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %addr, "certwatch listening");

    drop(shutdown_rx);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    // The serve future returns once in-flight requests finish; drain the
    // pipeline within the deadline and stop the sweeper.
    info!("shutting down");
    let _ = shutdown_tx.send(true);
    if tokio::time::timeout(DRAIN_DEADLINE, pipeline.shutdown())
        .await
        .is_err()
    {
        error!("persistence pipeline did not drain within the deadline");
    }
    let _ = sweeper.await;

    info!("certwatch stopped");
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
