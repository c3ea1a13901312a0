//! Minimal JSON API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ access log ─▶ security headers ─▶ origin guard ─▶ rate limit
//!                                                                          │
//!                     ┌────────────────────────────────────────────────────┘
//!                     ▼
//!                 JSON body ─▶ static files ─▶ api docs ─▶ health ─▶ router
//!                                                                      │
//!     Client Response                                                  ▼
//!     ◀────────────── response hooks (reverse order) ◀── handler / not found / translator
//! ```
//!
//! Startup: configuration (file, `.env`, environment) → tracing → metrics →
//! database → listener. Shutdown: SIGINT/SIGTERM → drain → close database.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use api_server::config::{load_config, ObservabilityConfig};
use api_server::lifecycle::{bootstrap, signals, StartupError};
use api_server::observability::{logging, metrics};
use api_server::{HttpServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "api-server", version, about = "Minimal JSON API server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "CONFIG_PATH")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Failed to read .env file: {e}");
        }
    }
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init_tracing(&ObservabilityConfig::default());
            if e.is_missing_database_uri() {
                tracing::error!("MONGO_URI is not defined in environment variables");
            }
            tracing::error!(error = %e, "Configuration error");
            return Err(e.into());
        }
    };

    logging::init_tracing(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address(),
        docs_host = %config.docs.host,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let (context, listener) = match bootstrap(config).await {
        Ok(started) => started,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return Err(e);
        }
    };
    if let Some(database) = context.database() {
        let name = database
            .client()
            .default_database()
            .map(|db| db.name().to_string());
        tracing::info!(database = ?name, "Database ready");
    }
    let context = Arc::new(context);

    let shutdown = Shutdown::new();
    let server = HttpServer::new(context.clone());
    let stopped = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown);

    let served = server.run(listener, stopped).await;
    context.teardown().await;

    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
        return Err(StartupError::Serve(e));
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
