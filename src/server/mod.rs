//! HTTP surface: task submission, task inspection, the engine boundary and
//! remote executor sessions.

mod router;
mod sessions;
mod state;
mod tasks;

pub use router::build_router;
pub use sessions::SessionRegistry;
pub use state::AppState;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::auth::ApiKeyPolicy;
use crate::config::AppConfig;
use crate::{metrics, runtime};

/// Assemble the state for `config` without binding a socket.
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let store = runtime::build_store(&config.storage);
    let executors = runtime::build_executor_provider(&config.browser)?;
    let gateway = runtime::build_gateway(config, store, executors.clone())?;
    Ok(AppState::new(
        gateway,
        SessionRegistry::new(executors, config.server.max_sessions)
            .with_idle_timeout(config.server.session_idle_timeout()),
        ApiKeyPolicy::new(config.server.api_key.clone()),
    ))
}

pub async fn serve(config: AppConfig) -> Result<()> {
    metrics::register_metrics();
    let state = build_state(&config)?;
    if !state.auth.is_enforced() {
        tracing::warn!("server.api_key is not set; /v1 routes are unauthenticated");
    }
    let sessions = state.sessions.clone();
    sessions.start_reaper();
    let app = build_router(state);

    let listener = TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("TaskPilot listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    sessions.close_all().await;
    info!("TaskPilot server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
