//! MongoDB connection bootstrap.
//!
//! One client per process, established before the listener binds. The
//! handle is cheap to clone; [`Database::close`] shuts the shared client down
//! once no matter how many clones call it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;
use thiserror::Error;

use crate::config::DatabaseConfig;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("MONGO_URI is not set")]
    MissingUri,

    #[error("Invalid MongoDB connection string: {0}")]
    InvalidUri(#[source] mongodb::error::Error),

    #[error("MongoDB connection failed: {0}")]
    Connect(#[source] mongodb::error::Error),
}

#[derive(Debug, Clone)]
pub struct Database {
    client: Client,
    closed: Arc<AtomicBool>,
}

impl Database {
    /// Parse the connection string, build the client and ping the server.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let uri = config
            .uri
            .as_deref()
            .filter(|uri| !uri.trim().is_empty())
            .ok_or(DatabaseError::MissingUri)?;

        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(DatabaseError::InvalidUri)?;
        options.app_name = Some(config.app_name.clone());
        options.server_selection_timeout =
            Some(Duration::from_secs(config.server_selection_timeout_secs));

        let client = Client::with_options(options).map_err(DatabaseError::InvalidUri)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(DatabaseError::Connect)?;

        tracing::info!(app_name = %config.app_name, "MongoDB connected");
        Ok(Self::from_client(client))
    }

    /// Wrap an already constructed client without pinging it.
    pub fn from_client(client: Client) -> Self {
        Self {
            client,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shut the client down. Only the first call does anything.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.client.clone().shutdown().await;
        tracing::info!("database connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(uri: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            uri: uri.map(String::from),
            ..DatabaseConfig::default()
        }
    }

    #[tokio::test]
    async fn test_missing_uri() {
        let err = Database::connect(&config(None)).await.unwrap_err();
        assert!(matches!(err, DatabaseError::MissingUri));

        let err = Database::connect(&config(Some("  "))).await.unwrap_err();
        assert!(matches!(err, DatabaseError::MissingUri));
    }

    #[tokio::test]
    async fn test_invalid_uri() {
        let err = Database::connect(&config(Some("not-a-mongo-uri")))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidUri(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let options = ClientOptions::parse("mongodb://127.0.0.1:1").await.unwrap();
        let db = Database::from_client(Client::with_options(options).unwrap());
        let clone = db.clone();

        tokio::time::timeout(Duration::from_secs(5), db.close())
            .await
            .unwrap();
        assert!(clone.is_closed());

        // Second call returns immediately.
        tokio::time::timeout(Duration::from_millis(100), clone.close())
            .await
            .unwrap();
    }
}
