//! Origin restriction.
//!
//! Requests without an `Origin` header are same-origin or non-browser and
//! pass untouched. Cross-origin requests must come from the allow-list and
//! use an allowed method; state-changing requests and preflights from other
//! origins are rejected with 403.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};

use crate::config::CorsConfig;
use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::pipeline::{Flow, Stage};

/// Allowed origin echoed back on the response.
#[derive(Debug, Clone)]
struct AllowedOrigin(HeaderValue);

#[derive(Debug, Clone)]
pub struct OriginGuard {
    origins: Vec<String>,
    methods: Vec<Method>,
    allow_methods: HeaderValue,
}

impl OriginGuard {
    pub fn new(config: &CorsConfig) -> Self {
        let methods: Vec<Method> = config
            .allowed_methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
            .collect();
        let joined = methods
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(",");

        Self {
            origins: config
                .allowed_origins
                .iter()
                .map(|o| o.trim_end_matches('/').to_owned())
                .collect(),
            methods,
            allow_methods: HeaderValue::from_str(&joined)
                .unwrap_or_else(|_| HeaderValue::from_static("GET,POST")),
        }
    }

    fn is_allowed_origin(&self, origin: &str) -> bool {
        self.origins.iter().any(|o| o == origin)
    }

    fn is_preflight(request: &Request) -> bool {
        request.method() == Method::OPTIONS
            && request
                .headers()
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    }
}

#[async_trait]
impl Stage for OriginGuard {
    fn name(&self) -> &'static str {
        "origin_guard"
    }

    async fn handle(&self, request: Request, ctx: &mut RequestContext) -> Flow {
        let Some(origin) = request.headers().get(header::ORIGIN).cloned() else {
            return Flow::Continue(request);
        };
        let origin_str = origin.to_str().unwrap_or_default();
        let preflight = Self::is_preflight(&request);

        if !self.is_allowed_origin(origin_str) {
            let state_changing = !matches!(*request.method(), Method::GET | Method::HEAD);
            if preflight || state_changing {
                return Flow::Fail(ApiError::Forbidden(
                    "Origin not allowed by CORS policy".to_string(),
                ));
            }
            return Flow::Continue(request);
        }

        ctx.annotations.insert(AllowedOrigin(origin));

        if preflight {
            let response = (
                StatusCode::NO_CONTENT,
                [(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone())],
            )
                .into_response();
            return Flow::Respond(response);
        }

        if !self.methods.contains(request.method()) {
            return Flow::Fail(ApiError::Forbidden(format!(
                "Method {} not allowed by CORS policy",
                request.method()
            )));
        }

        Flow::Continue(request)
    }

    fn on_response(&self, ctx: &RequestContext, response: &mut Response) {
        if let Some(AllowedOrigin(origin)) = ctx.annotations.get::<AllowedOrigin>() {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
    }
}
