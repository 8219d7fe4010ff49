//! Application builder: wires router, middleware, engine, and jobs.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;

use beacon_core::config::AppConfig;
use beacon_core::error::{AppError, ErrorKind};
use beacon_realtime::RealtimeEngine;
use beacon_worker::{JobManager, PingInactiveConnectionsJob, PruneStaleConnectionsJob};

use crate::middleware::cors::build_cors_layer;
use crate::router::build_router;
use crate::state::AppState;

/// Name of the heartbeat job.
pub const PING_JOB: &str = "ping-inactive-connections";
/// Name of the stale-connection job.
pub const PRUNE_JOB: &str = "prune-stale-connections";

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.server.cors);
    build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Registers and starts the housekeeping jobs.
pub async fn start_jobs(config: &AppConfig, engine: &RealtimeEngine) -> Result<JobManager, AppError> {
    let jobs = JobManager::new()
        .await
        .map_err(|e| AppError::internal(format!("Job manager init failed: {e}")))?;

    jobs.register(
        PING_JOB,
        Arc::new(PingInactiveConnectionsJob::new(
            Arc::clone(&engine.connections),
            Duration::from_secs(config.worker.ping_tick_seconds),
        )),
    )
    .await;
    jobs.register(
        PRUNE_JOB,
        Arc::new(PruneStaleConnectionsJob::new(
            Arc::clone(&engine.connections),
            Duration::from_secs(config.worker.prune_tick_seconds),
        )),
    )
    .await;

    let failures = jobs.start_all().await;
    if !failures.is_empty() {
        tracing::warn!(failed = failures.len(), "Some housekeeping jobs did not start");
    }
    Ok(jobs)
}

/// Runs the Beacon server until a shutdown signal arrives.
pub async fn run_server(config: AppConfig) -> Result<(), AppError> {
    tracing::info!(apps = config.apps.len(), "Starting Beacon server...");

    let config = Arc::new(config);
    let engine = Arc::new(RealtimeEngine::new(&config)?);

    let jobs = if config.worker.enabled {
        Some(start_jobs(&config, &engine).await?)
    } else {
        tracing::info!("Housekeeping jobs disabled");
        None
    };

    let app = build_app(AppState::new(Arc::clone(&config), Arc::clone(&engine)));
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Internal, format!("Failed to bind {addr}"), e))?;

    tracing::info!("Beacon server listening on {}", addr);

    let shutdown_engine = Arc::clone(&engine);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown_engine.shutdown();
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    if let Some(jobs) = jobs {
        jobs.stop_all().await;
    }
    tracing::info!("Beacon server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
