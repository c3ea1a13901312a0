//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {name}: `{value}`")]
    InvalidEnv { name: &'static str, value: String },

    #[error(
        "Validation failed: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    Validation(Vec<ValidationError>),
}

impl ConfigError {
    /// True when the only reason for failure is the missing connection string.
    pub fn is_missing_database_uri(&self) -> bool {
        matches!(self, ConfigError::Validation(errors) if errors.contains(&ValidationError::MissingMongoUri))
    }
}

/// Load configuration: optional TOML file, then environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServerConfig::default(),
    };

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Apply `PORT`, `HOST` and `MONGO_URI` on top of file values.
pub fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT") {
        config.listener.port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { name: "PORT", value: port })?;
    }

    if let Some(host) = lookup("HOST") {
        config.docs.host = host;
    }

    if let Some(uri) = lookup("MONGO_URI") {
        config.database.uri = Some(uri);
    }

    Ok(())
}
