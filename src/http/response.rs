//! Response payload shapes shared across stages.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Current time as ISO 8601 with millisecond precision and `Z` suffix.
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Uniform client-facing error payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
    pub path: String,
    pub timestamp: String,
}

/// Plain `{"message": ...}` payload.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Scoped not-found payload for API routes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteNotFound {
    pub error: String,
}
