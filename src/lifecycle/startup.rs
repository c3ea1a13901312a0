//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect to the database before anything listens
//! - Build the shared application context (config, outbound client, database)
//! - Bind the listener last, so traffic only arrives once ready
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Teardown is explicit and awaited by the caller

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{ConfigError, ServerConfig};
use crate::database::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Everything handlers and stages share for the life of the process.
#[derive(Debug)]
pub struct AppContext {
    pub config: ServerConfig,
    pub http_client: reqwest::Client,
    database: Option<Database>,
}

impl AppContext {
    /// Context without a database handle.
    pub fn new(config: ServerConfig) -> Result<Self, StartupError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.external.timeout_secs))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            config,
            http_client,
            database: None,
        })
    }

    pub fn with_database(mut self, database: Database) -> Self {
        self.database = Some(database);
        self
    }

    pub fn database(&self) -> Option<&Database> {
        self.database.as_ref()
    }

    /// Release external resources. Safe to call more than once.
    pub async fn teardown(&self) {
        if let Some(database) = &self.database {
            database.close().await;
        }
    }
}

/// Connect, build the context, then bind.
pub async fn bootstrap(config: ServerConfig) -> Result<(AppContext, TcpListener), StartupError> {
    let database = Database::connect(&config.database).await?;
    let context = AppContext::new(config)?.with_database(database);

    let address = context.config.listener.bind_address();
    let listener = match TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(source) => {
            context.teardown().await;
            return Err(StartupError::Bind { address, source });
        }
    };

    Ok((context, listener))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_context_without_database() {
        let ctx = AppContext::new(ServerConfig::default()).unwrap();
        assert!(ctx.database().is_none());
        ctx.teardown().await;
        ctx.teardown().await;
    }

    #[tokio::test]
    async fn test_bootstrap_requires_uri() {
        let err = bootstrap(ServerConfig::default()).await.unwrap_err();
        assert!(matches!(err, StartupError::Database(DatabaseError::MissingUri)));
    }
}
