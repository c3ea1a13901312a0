//! Interactive API documentation.
//!
//! The OpenAPI document is generated from handler annotations; the server
//! URL is filled in from the configured public host at startup. Swagger UI is
//! served under the docs prefix and the raw document at `{prefix}.json`.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{Method, StatusCode},
    Router,
};
use tower::ServiceExt;
use utoipa::openapi::{self, server::Server};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::DocsConfig;
use crate::health;
use crate::http::request::RequestContext;
use crate::http::response::{ErrorBody, ErrorEnvelope, MessageResponse, RouteNotFound};
use crate::pipeline::{Flow, Stage};
use crate::routing::handlers::{self, DataSubmission};
use crate::routing::validation::{FieldError, ValidationErrors};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "api-server",
        description = "Minimal HTTP API: greeting, external relay, validated submission and health check."
    ),
    paths(
        handlers::welcome,
        handlers::greeting,
        handlers::external,
        handlers::submit_data,
        health::health,
    ),
    components(schemas(
        MessageResponse,
        DataSubmission,
        FieldError,
        ValidationErrors,
        RouteNotFound,
        ErrorEnvelope,
        ErrorBody,
        health::HealthStatus,
    )),
    tags(
        (name = "general", description = "Landing page"),
        (name = "api", description = "API endpoints"),
        (name = "health", description = "Liveness check")
    )
)]
pub struct ApiDoc;

/// OpenAPI document with its server URL pointing at `host`.
pub fn openapi_for_host(host: &str) -> openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.servers = Some(vec![Server::new(format!("http://{host}"))]);
    doc
}

/// Serves Swagger UI and the document; everything else under the prefix falls through.
#[derive(Clone)]
pub struct ApiDocs {
    prefix: String,
    router: Router,
}

impl ApiDocs {
    pub fn new(config: &DocsConfig) -> Self {
        let spec_url = format!("{}.json", config.path);
        let router = Router::new().merge(
            SwaggerUi::new(config.path.clone()).url(spec_url, openapi_for_host(&config.host)),
        );
        Self {
            prefix: config.path.clone(),
            router,
        }
    }
}

#[async_trait]
impl Stage for ApiDocs {
    fn name(&self) -> &'static str {
        "api_docs"
    }

    async fn handle(&self, request: Request, _ctx: &mut RequestContext) -> Flow {
        let readable = matches!(*request.method(), Method::GET | Method::HEAD);
        if !readable || !request.uri().path().starts_with(&self.prefix) {
            return Flow::Continue(request);
        }

        let (parts, body) = request.into_parts();
        let lookup = Request::from_parts(parts.clone(), axum::body::Body::empty());
        let response = match self.router.clone().oneshot(lookup).await {
            Ok(response) => response,
            Err(infallible) => match infallible {},
        };

        if matches!(
            response.status(),
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED
        ) {
            return Flow::Continue(Request::from_parts(parts, body));
        }
        Flow::Respond(response)
    }
}
