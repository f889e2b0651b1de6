mod config;
mod protocol;
mod routes;
mod services;
mod state;

use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::services::hub::{Drain, Hub};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let addr = config.bind_addr();
    let grace = config.shutdown_grace;
    let state = state::AppState::new(config);
    let hub = state.hub.clone();

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "cursorcast listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown(hub, grace))
        .await?;

    info!("listener closed, shutdown complete");
    Ok(())
}

/// Resolves once a termination signal arrives and the hub has drained.
///
/// Axum keeps accepting until this future resolves, then stops accepting and
/// drops the listener in one step. Clients that connect during the grace
/// period are upgraded and closed with 1001 because the hub refuses joins.
async fn shutdown(hub: Hub, grace: Duration) {
    wait_for_signal().await;
    info!("shutdown signal received, closing sessions");

    match hub.shutdown(grace).await {
        Drain::Idle { dropped } => info!(dropped, "all connections closed"),
        Drain::TimedOut { dropped, remaining } => warn!(
            dropped,
            remaining,
            grace_secs = grace.as_secs(),
            "connections still open after grace period"
        ),
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
