//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber (pretty or JSON)
//! - Access log for every request, emitted once the response is known
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - Access log carries the combined-log fields as structured fields

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderValue, Version},
    response::Response,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::http::request::{RequestContext, X_REQUEST_ID};
use crate::observability::metrics;
use crate::pipeline::{Flow, Stage};

/// Install the global subscriber. Safe to call more than once.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("api_server={0},tower_http={0}", config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Request fields only visible before the request moves down the chain.
#[derive(Debug, Clone)]
struct AccessFields {
    version: Version,
    referrer: Option<String>,
    user_agent: Option<String>,
}

/// Access logger. First stage, so its response hook runs last.
#[derive(Debug, Default, Clone)]
pub struct AccessLog;

impl AccessLog {
    pub fn new() -> Self {
        Self
    }
}

fn header_string(request: &Request, name: header::HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

#[async_trait]
impl Stage for AccessLog {
    fn name(&self) -> &'static str {
        "access_log"
    }

    async fn handle(&self, request: Request, ctx: &mut RequestContext) -> Flow {
        ctx.annotations.insert(AccessFields {
            version: request.version(),
            referrer: header_string(&request, header::REFERER),
            user_agent: header_string(&request, header::USER_AGENT),
        });
        Flow::Continue(request)
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        if let Ok(value) = HeaderValue::from_str(&ctx.request_id) {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }

        let latency = ctx.started.elapsed();
        let status = response.status().as_u16();
        let content_length = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        let fields = ctx.annotations.get::<AccessFields>();

        tracing::info!(
            request_id = %ctx.request_id,
            remote_addr = ctx.client_ip.as_deref().unwrap_or("-"),
            method = %ctx.method,
            url = %ctx.original_url,
            version = ?fields.map(|f| f.version),
            status,
            content_length,
            referrer = fields.and_then(|f| f.referrer.as_deref()).unwrap_or("-"),
            user_agent = fields.and_then(|f| f.user_agent.as_deref()).unwrap_or("-"),
            latency_ms = latency.as_secs_f64() * 1000.0,
            "Request completed"
        );

        metrics::record_request(ctx.method.as_str(), status, latency);
    }
}
