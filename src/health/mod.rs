//! Liveness check.
//!
//! `GET`/`HEAD /health` answers before routing with a fixed-shape payload and the
//! current time. It does not consult any dependency and cannot fail.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::Method,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::http::request::RequestContext;
use crate::http::response::iso_timestamp;
use crate::pipeline::{Flow, Stage};

pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthStatus {
    #[schema(example = "UP")]
    pub status: String,
    #[schema(example = "2024-01-01T00:00:00.000Z")]
    pub timestamp: String,
}

/// Report service status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = HealthStatus)
    )
)]
pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "UP".to_string(),
        timestamp: iso_timestamp(),
    })
}

#[derive(Debug, Default, Clone)]
pub struct HealthCheck;

#[async_trait]
impl Stage for HealthCheck {
    fn name(&self) -> &'static str {
        "health"
    }

    async fn handle(&self, request: Request, _ctx: &mut RequestContext) -> Flow {
        let readable = matches!(*request.method(), Method::GET | Method::HEAD);
        if readable && request.uri().path() == HEALTH_PATH {
            return Flow::Respond(health().await.into_response());
        }
        Flow::Continue(request)
    }
}
