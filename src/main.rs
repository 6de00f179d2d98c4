mod config;
mod error;
mod frame;
mod live;
mod relay;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::live::gemini::GeminiLiveClient;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env().expect("invalid configuration");
    tracing::info!(
        model = %config.session.model,
        modality = config.session.modality.as_api_str(),
        input_rate = config.session.input_rate,
        output_rate = config.session.output_rate,
        "live session defaults loaded"
    );

    let connector = GeminiLiveClient::new(config.api_key.clone(), config.live_base_url.clone(), config.connect_timeout);
    let state = state::AppState::new(&config, Arc::new(connector));
    let shutdown = state.shutdown.clone();
    let relays = state.relays.clone();

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "liverelay listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .expect("server failed");

    relays.close();
    if tokio::time::timeout(config.shutdown_grace, relays.wait()).await.is_err() {
        tracing::warn!(remaining = relays.len(), "shutdown: relays still open after grace period");
    }
    tracing::info!("shutdown: complete");
}

/// Resolve on Ctrl-C, cancelling every relay first.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "shutdown: failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown: signal received, closing relays");
    shutdown.cancel();
}
