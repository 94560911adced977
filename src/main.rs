//! # Gemini Relay - Server Entry Point
//!
//! Loads configuration, builds the provider clients and runs the actix-web
//! server until Ctrl+C or SIGTERM.
//!
//! ## Startup Order:
//! 1. `.env` and tracing
//! 2. Configuration (`config.toml` + environment), validated
//! 3. Provider clients and shared state
//! 4. HTTP server with CORS, request tracing and metrics
//!
//! A missing Gemini API key does not stop startup: `/health` reports
//! `gemini_configured: false` and each completion fails with a clear error.

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use gemini_relay::config::AppConfig;
use gemini_relay::middleware::MetricsMiddleware;
use gemini_relay::state::AppState;
use gemini_relay::{build_cors, configure_routes};
use tracing::{error, info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("Starting {} v{}", config.service_name, env!("CARGO_PKG_VERSION"));
    if !config.gemini_configured() {
        warn!("GEMINI_API_KEY is not set; completion requests will fail until it is configured");
    }

    let app_state = AppState::from_config(config.clone()).context("Failed to initialize Gemini client")?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let test_endpoint = config.features.test_endpoint;
    let cors_config = config.cors.clone();

    info!(
        bind = %bind_addr,
        default_model = %config.gemini.default_model,
        voice_enabled = app_state.voice_enabled(),
        test_endpoint,
        "Starting HTTP server"
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(build_cors(&cors_config))
            .wrap(MetricsMiddleware)
            .wrap(TracingLogger::default())
            .configure(|cfg| configure_routes(cfg, test_endpoint))
    })
    .disable_signals()
    .bind(&bind_addr)
    .with_context(|| format!("Failed to bind {}", bind_addr))?
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tokio::select! {
        result = server_task => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task error: {}", e),
                Ok(Ok(())) => {}
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received, stopping server...");
            server_handle.stop(true).await;
        }
    }

    info!("Server stopped gracefully");
    Ok(())
}

/// `RUST_LOG` wins; otherwise debug for this crate and info for actix.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gemini_relay=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
