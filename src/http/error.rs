//! Per-request failure type.
//!
//! Any stage or handler that cannot complete a request returns an
//! [`ApiError`]. The pipeline funnels every one of them through the error
//! translator, which is the only place they become client-facing payloads.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors that can occur while serving a request.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client sent something unusable.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Cross-origin request rejected.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Body exceeds the configured limit. `size` is known only when declared.
    #[error("Request body exceeds limit of {limit} bytes (declared: {size:?})")]
    PayloadTooLarge { size: Option<u64>, limit: usize },

    /// Client exceeded its request budget for the current window.
    #[error("Rate limit exceeded for {client}")]
    TooManyRequests { client: String },

    /// Outbound call failed (network, timeout or decode).
    #[error("Upstream request to {url} failed")]
    Upstream {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// I/O error while resolving a static file (not "not found").
    #[error("Static file error for {path}")]
    StaticFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status for the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { source, .. } if source.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::StaticFile { .. } | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show the client. Server-side failures never carry detail.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::Forbidden(msg) => msg.clone(),
            ApiError::PayloadTooLarge { .. } => "Request entity too large".to_string(),
            ApiError::TooManyRequests { .. } => {
                "Too many requests, please try again later.".to_string()
            }
            ApiError::Upstream { source, .. } if source.is_timeout() => {
                "Upstream request timed out".to_string()
            }
            ApiError::Upstream { .. } => "Failed to fetch external data".to_string(),
            ApiError::StaticFile { .. } => "Error serving static file".to_string(),
            ApiError::Internal(_) => "Internal Server Error".to_string(),
        }
    }
}

/// Marker carried in response extensions when a handler failed.
///
/// The pipeline replaces any response carrying it with the translated payload.
#[derive(Debug, Clone)]
pub struct ErrorSignal(pub Arc<ApiError>);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = self.status_code().into_response();
        response.extensions_mut().insert(ErrorSignal(Arc::new(self)));
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::TooManyRequests { client: "1.2.3.4".into() }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::PayloadTooLarge { size: Some(10), limit: 5 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err = ApiError::Internal("connection string mongodb://user:pw@host".into());
        assert_eq!(err.public_message(), "Internal Server Error");

        let err = ApiError::StaticFile {
            path: "/secret".into(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/var/www/secret"),
        };
        assert_eq!(err.public_message(), "Error serving static file");
    }

    #[test]
    fn test_into_response_carries_signal() {
        let response = ApiError::Forbidden("nope".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let signal = response.extensions().get::<ErrorSignal>().unwrap();
        assert!(matches!(*signal.0, ApiError::Forbidden(_)));
    }
}
