//! Recipe Gateway Service
//!
//! Main entry point for the recipe AI gateway.

use anyhow::{Context, Result};
use recipe_gateway::{
    analytics::store_from_config, config::Config, create_router, gemini::GeminiClient,
    rate_limiter::RateLimiter, AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipe_gateway=debug,recipe_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Recipe Gateway");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Configuration loaded");
    info!("  API address: {}", config.api_address());
    info!("  Model: {}", config.gemini_model);
    info!(
        "  Rate limit: {} requests per {}s",
        config.rate_limit_max_requests, config.rate_limit_window_secs
    );

    if config.analytics_enabled() {
        info!("  Analytics table: {}", config.analytics_table);
    } else {
        warn!("Analytics store not configured, request logging disabled");
    }

    let model = GeminiClient::from_config(&config).context("Failed to create upstream client")?;
    let store = store_from_config(&config);
    let rate_limiter =
        RateLimiter::with_window(config.rate_limit_max_requests, config.rate_limit_window());

    let state = AppState::new(Arc::new(model), store, rate_limiter)
        .with_max_body_bytes(config.max_body_bytes);

    // Create router
    let app = create_router(state);

    // Start server
    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Recipe Gateway listening on {}", config.api_address());
    info!("Health check: http://{}/health", config.api_address());

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Recipe Gateway stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
