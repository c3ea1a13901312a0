//! Error translation.
//!
//! The single funnel for failures: logs the full error server-side and
//! renders the uniform `{"error": {message, status, path, timestamp}}` body.

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::http::response::{iso_timestamp, ErrorBody, ErrorEnvelope};

pub fn translate(ctx: &RequestContext, err: &ApiError) -> Response {
    let status = err.status_code();

    if status.is_server_error() {
        tracing::error!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.original_url,
            status = status.as_u16(),
            error = ?err,
            "Request failed"
        );
    } else {
        tracing::warn!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.original_url,
            status = status.as_u16(),
            error = %err,
            "Request rejected"
        );
    }

    let envelope = ErrorEnvelope {
        error: ErrorBody {
            message: err.public_message(),
            status: status.as_u16(),
            path: ctx.original_url.clone(),
            timestamp: iso_timestamp(),
        },
    };

    (status, Json(envelope)).into_response()
}
