pub mod router;
pub mod state;

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::relay::Relay;
use crate::upstream::openai::OpenAiSource;

/// Start the HTTP server with the given configuration.
///
/// Fails before binding if no upstream API key is configured.
pub async fn start(config: RelayConfig) -> Result<()> {
    let source = OpenAiSource::from_config(&config.upstream)?;
    tracing::info!(
        model = source.model(),
        endpoint = %source.endpoint(),
        "Initialized upstream source"
    );

    let relay = Arc::new(Relay::new(Arc::new(source), config.relay.channel_capacity));
    tracing::info!(
        source = relay.source_name(),
        channel_capacity = config.relay.channel_capacity,
        "Relay ready"
    );

    let bind_addr = config.bind_address();
    let app_state = state::AppState::new(relay);

    let app = router::build(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| RelayError::Server(format!("Failed to bind to {bind_addr}: {e}")))?;

    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::Server(format!("Server error: {e}")))?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
