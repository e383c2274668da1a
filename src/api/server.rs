use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use super::{
    services::{apply, dismiss_error, health, refresh_config, reset, status},
    state::AppState,
};
use crate::runtime::Runtime;
use crate::scheduler::{RetryPolicy, RunScheduler};
use crate::watcher::ConfigWatcher;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Routes of the control surface
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/config/refresh", post(refresh_config))
        .route("/apply", post(apply))
        .route("/reset", post(reset))
        .route("/error/dismiss", post(dismiss_error))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the control surface with the scheduler and configuration watcher
pub async fn run(runtime: Runtime, address: SocketAddr) -> Result<(), AnyError> {
    let policy = RetryPolicy::from_config(&runtime.config.scheduler);
    let scheduler = Arc::new(RunScheduler::spawn(
        Arc::clone(&runtime.orchestrator),
        policy,
    ));

    let mut watcher = ConfigWatcher::new(&runtime.config_path, Arc::clone(&scheduler))?;
    match watcher.start() {
        Ok(()) => {
            tokio::spawn(watcher.run());
        }
        // Serving still works; changes just need a manual apply
        Err(e) => warn!(error = %e, "Configuration watcher disabled"),
    }

    let state = AppState::new(Arc::clone(&runtime.orchestrator), Arc::clone(&scheduler));
    {
        let mut view = state.view.write().await;
        view.config = (&runtime.orchestrator.read_config()).into();
    }

    let listener = TcpListener::bind(address).await?;
    info!(%address, "tonebox control surface listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    runtime.ledger.persist()?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received");
}
