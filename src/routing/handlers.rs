//! Route handlers.

use std::sync::Arc;

use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;

use crate::http::error::ApiError;
use crate::http::response::{MessageResponse, RouteNotFound};
use crate::lifecycle::startup::AppContext;

pub const WELCOME_TEXT: &str = "Hello, world! Welcome to the API server.";
pub const GREETING: &str = "Hello from the API!";
pub const DATA_RECEIVED: &str = "Data received successfully!";

/// Welcome text.
#[utoipa::path(
    get,
    path = "/",
    tag = "general",
    responses(
        (status = 200, description = "Welcome text", body = String, content_type = "text/plain")
    )
)]
pub async fn welcome() -> &'static str {
    WELCOME_TEXT
}

/// Fixed greeting.
#[utoipa::path(
    get,
    path = "/api/greeting",
    tag = "api",
    responses(
        (status = 200, description = "Greeting message", body = MessageResponse)
    )
)]
pub async fn greeting() -> Json<MessageResponse> {
    Json(MessageResponse::new(GREETING))
}

/// Relay JSON from the configured upstream.
#[utoipa::path(
    get,
    path = "/api/external",
    tag = "api",
    responses(
        (status = 200, description = "Upstream JSON, relayed as-is", body = Object),
        (status = 502, description = "Upstream unreachable or returned invalid JSON", body = crate::http::response::ErrorEnvelope),
        (status = 504, description = "Upstream timed out", body = crate::http::response::ErrorEnvelope)
    )
)]
pub async fn external(State(ctx): State<Arc<AppContext>>) -> Result<Json<Value>, ApiError> {
    let url = &ctx.config.external.url;
    let upstream = |source| ApiError::Upstream {
        url: url.clone(),
        source,
    };

    let response = ctx.http_client.get(url).send().await.map_err(upstream)?;
    tracing::debug!(url = %url, status = %response.status(), "Upstream responded");
    let body = response.json::<Value>().await.map_err(upstream)?;

    Ok(Json(body))
}

/// Accept a submission once its `email` has been validated.
#[utoipa::path(
    post,
    path = "/api/data",
    tag = "api",
    request_body(content = DataSubmission, content_type = "application/json"),
    responses(
        (status = 200, description = "Submission accepted", body = MessageResponse),
        (status = 400, description = "Invalid email", body = crate::routing::validation::ValidationErrors)
    )
)]
pub async fn submit_data() -> Json<MessageResponse> {
    Json(MessageResponse::new(DATA_RECEIVED))
}

/// Request body documented for `POST /api/data`.
#[derive(Debug, Clone, serde::Deserialize, utoipa::ToSchema)]
pub struct DataSubmission {
    #[schema(example = "user@example.com")]
    pub email: String,
}

/// Fallback for unmatched routes and unmatched methods.
pub async fn not_found(
    State(ctx): State<Arc<AppContext>>,
    OriginalUri(uri): OriginalUri,
) -> Response {
    let prefix = ctx.config.routing.api_prefix.as_str();
    let path = uri.path();
    let under_api = path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'));

    if under_api {
        (
            StatusCode::NOT_FOUND,
            Json(RouteNotFound {
                error: "API route not found".to_string(),
            }),
        )
            .into_response()
    } else {
        (StatusCode::NOT_FOUND, "Page not found").into_response()
    }
}
