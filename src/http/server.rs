//! HTTP server setup.
//!
//! # Responsibilities
//! - Assemble the stage pipeline in its fixed order
//! - Mount the route table as the pipeline's terminal router
//! - Serve with client addresses attached and graceful shutdown

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::docs::ApiDocs;
use crate::health::HealthCheck;
use crate::http::body::JsonBodyParser;
use crate::http::static_files::StaticFiles;
use crate::lifecycle::shutdown;
use crate::lifecycle::startup::AppContext;
use crate::observability::logging::AccessLog;
use crate::pipeline::Pipeline;
use crate::routing::build_router;
use crate::security::access_control::OriginGuard;
use crate::security::headers::SecurityHeaders;
use crate::security::rate_limit::RateLimiter;

pub struct HttpServer {
    pipeline: Pipeline,
}

impl HttpServer {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let config = &ctx.config;

        let pipeline = Pipeline::builder()
            .stage(AccessLog::new())
            .stage_if(config.security.enable_headers, || {
                Box::new(SecurityHeaders::default())
            })
            .stage(OriginGuard::new(&config.cors))
            .stage_if(config.rate_limit.enabled, || {
                Box::new(RateLimiter::new(&config.rate_limit))
            })
            .stage(JsonBodyParser::new(config.security.max_body_size))
            .stage_if(config.static_files.enabled, || {
                Box::new(StaticFiles::new(&config.static_files.root))
            })
            .stage_if(config.docs.enabled, || Box::new(ApiDocs::new(&config.docs)))
            .stage(HealthCheck::default())
            .build(build_router(ctx.clone()));

        tracing::debug!(stages = ?pipeline.stage_names(), "Pipeline assembled");
        Self { pipeline }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    /// The complete application as a router, for in-process tests.
    pub fn router(self) -> Router {
        self.pipeline.into_router()
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Server is running on port {}", addr.port());

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown::notified(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
