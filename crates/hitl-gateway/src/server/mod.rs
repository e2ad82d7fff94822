pub mod router;
pub mod state;

use anyhow::Context;
use hitl_backend::HttpBackend;
use hitl_relay::Gateway;
use std::sync::Arc;

use crate::config::Config;

/// Start the HTTP server with the given configuration.
pub async fn start(config: Config) -> anyhow::Result<()> {
    let backend = HttpBackend::with_timeout(&config.backend_url, config.request_timeout())
        .with_context(|| format!("Invalid backend URL {}", config.backend_url))?;
    tracing::info!(
        backend = %backend.base_url(),
        app = %config.app_name,
        user = %config.user_id,
        "Using agent backend"
    );

    let gateway = Gateway::new(
        Arc::new(backend),
        config.identity(),
        config.gateway_config(),
    );
    let app = router::build(state::AppState::new(Arc::new(gateway)));

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    tracing::info!("Server listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
