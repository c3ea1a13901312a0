//! Per-request context.
//!
//! # Responsibilities
//! - Assign a request ID (propagating an incoming `x-request-id`)
//! - Capture the original URL and client address before any stage runs
//! - Carry typed annotations from a stage's request phase to its response phase

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    extract::{ConnectInfo, Request},
    http::{Extensions, HeaderName, Method},
};
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Everything the pipeline knows about a request besides the request itself.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    /// Path and query as received.
    pub original_url: String,
    /// Peer IP, if the connection info is available.
    pub client_ip: Option<String>,
    pub started: Instant,
    /// Stage annotations, keyed by type.
    pub annotations: Extensions,
}

impl RequestContext {
    pub fn from_request(request: &Request) -> Self {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let original_url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_owned())
            .unwrap_or_else(|| request.uri().path().to_owned());

        let client_ip = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Self {
            request_id,
            method: request.method().clone(),
            original_url,
            client_ip,
            started: Instant::now(),
            annotations: Extensions::new(),
        }
    }

    /// Path component of the original URL.
    pub fn path(&self) -> &str {
        self.original_url
            .split_once('?')
            .map_or(self.original_url.as_str(), |(path, _)| path)
    }
}
