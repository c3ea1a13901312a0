//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Every problem is reported,
//! not just the first one.

use thiserror::Error;
use url::Url;

use crate::config::schema::ServerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("MONGO_URI is not defined in the environment variables")]
    MissingMongoUri,

    #[error("rate_limit.{field} must be greater than zero")]
    ZeroRateLimit { field: &'static str },

    #[error("invalid external.url `{0}`")]
    InvalidExternalUrl(String),

    #[error("external.timeout_secs must be greater than zero")]
    ZeroExternalTimeout,

    #[error("invalid cors origin `{0}`")]
    InvalidOrigin(String),

    #[error("invalid cors method `{0}`")]
    InvalidMethod(String),

    #[error("{field} must start with '/' and not end with '/': `{value}`")]
    InvalidPrefix { field: &'static str, value: String },

    #[error("security.max_body_size must be greater than zero")]
    ZeroBodyLimit,
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.database.uri.as_deref() {
        Some(uri) if !uri.trim().is_empty() => {}
        _ => errors.push(ValidationError::MissingMongoUri),
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            errors.push(ValidationError::ZeroRateLimit { field: "window_secs" });
        }
        if config.rate_limit.max_requests == 0 {
            errors.push(ValidationError::ZeroRateLimit { field: "max_requests" });
        }
    }

    match Url::parse(&config.external.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidExternalUrl(config.external.url.clone())),
    }
    if config.external.timeout_secs == 0 {
        errors.push(ValidationError::ZeroExternalTimeout);
    }

    for origin in &config.cors.allowed_origins {
        if Url::parse(origin).is_err() {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }
    for method in &config.cors.allowed_methods {
        if axum::http::Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidMethod(method.clone()));
        }
    }

    if !is_valid_prefix(&config.routing.api_prefix) {
        errors.push(ValidationError::InvalidPrefix {
            field: "routing.api_prefix",
            value: config.routing.api_prefix.clone(),
        });
    }
    if config.docs.enabled && !is_valid_prefix(&config.docs.path) {
        errors.push(ValidationError::InvalidPrefix {
            field: "docs.path",
            value: config.docs.path.clone(),
        });
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    prefix.len() > 1 && prefix.starts_with('/') && !prefix.ends_with('/')
}
