//! claude-bridge — main entry point.
//!
//! Loads configuration from the environment, initializes logging, and runs
//! the HTTP server.

use anyhow::Result;
use claude_bridge::{api::build_router, AppConfig, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before reading any environment variables)
    dotenvy::dotenv().ok();

    // Respect RUST_LOG but always suppress noisy HTTP-library targets, which
    // would otherwise flood debug output with chunk-level logs.
    let base_filter =
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,claude_bridge=debug".to_string());
    let filter = tracing_subscriber::EnvFilter::new(format!(
        "{},hyper=warn,h2=warn,reqwest=warn",
        base_filter
    ));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let port = config.port;
    let http_client = create_http_client(&config);

    tracing::info!(
        upstream = %config.openai_base_url,
        timeout_secs = config.request_timeout_secs,
        "Upstream configured"
    );

    let state = Arc::new(AppState::new(config, http_client));
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Starting claude-bridge on {}", addr);
    tracing::info!("Messages API: POST /v1/messages");
    tracing::info!("Health probe: GET /health");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the upstream HTTP client with connection pooling.
fn create_http_client(config: &AppConfig) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()
        .expect("Failed to build HTTP client")
}
