//! JSON body parsing.
//!
//! Buffers and decodes `application/json` bodies once, before routing, and
//! attaches the parsed value to the request for handlers and validators.

use std::error::Error as StdError;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::header,
};
use http_body_util::LengthLimitError;
use serde_json::Value;

use crate::http::error::ApiError;
use crate::http::request::RequestContext;
use crate::pipeline::{Flow, Stage};

/// Parsed JSON body, stored in request extensions.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub Value);

#[derive(Debug, Clone)]
pub struct JsonBodyParser {
    limit: usize,
}

impl JsonBodyParser {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    fn is_json(request: &Request) -> bool {
        request
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
            .unwrap_or(false)
    }

    fn declared_length(request: &Request) -> Option<u64> {
        request
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
    }
}

/// True when reading stopped because the body outgrew the limit.
fn exceeded_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return true;
        }
        source = cause.source();
    }
    false
}

#[async_trait]
impl Stage for JsonBodyParser {
    fn name(&self) -> &'static str {
        "json_body"
    }

    async fn handle(&self, request: Request, _ctx: &mut RequestContext) -> Flow {
        if !Self::is_json(&request) {
            return Flow::Continue(request);
        }

        if let Some(size) = Self::declared_length(&request) {
            if size > self.limit as u64 {
                return Flow::Fail(ApiError::PayloadTooLarge {
                    size: Some(size),
                    limit: self.limit,
                });
            }
        }

        let (mut parts, body) = request.into_parts();
        let bytes = match to_bytes(body, self.limit).await {
            Ok(bytes) => bytes,
            Err(e) if exceeded_limit(&e) => {
                return Flow::Fail(ApiError::PayloadTooLarge {
                    size: None,
                    limit: self.limit,
                });
            }
            Err(e) => {
                tracing::debug!(error = %e, "Failed to read request body");
                return Flow::Fail(ApiError::BadRequest("Unable to read request body".to_string()));
            }
        };

        let value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Default::default())
        } else {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
                Ok(_) => {
                    return Flow::Fail(ApiError::BadRequest(
                        "JSON body must be an object or array".to_string(),
                    ))
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Malformed JSON body");
                    return Flow::Fail(ApiError::BadRequest("Malformed JSON body".to_string()));
                }
            }
        };

        parts.extensions.insert(JsonBody(value));
        Flow::Continue(Request::from_parts(parts, Body::from(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    fn json_request(body: &'static str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/api/data")
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::from(body))
            .unwrap()
    }

    async fn run(parser: &JsonBodyParser, request: Request) -> Flow {
        let mut ctx = RequestContext::from_request(&request);
        parser.handle(request, &mut ctx).await
    }

    #[tokio::test]
    async fn test_parses_object() {
        let flow = run(&JsonBodyParser::new(1024), json_request(r#"{"email":"a@b.co"}"#)).await;
        let Flow::Continue(request) = flow else {
            panic!("expected continue");
        };
        assert_eq!(
            request.extensions().get::<JsonBody>(),
            Some(&JsonBody(json!({"email": "a@b.co"})))
        );
        let bytes = to_bytes(request.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], br#"{"email":"a@b.co"}"#);
    }

    #[tokio::test]
    async fn test_empty_body_is_empty_object() {
        let Flow::Continue(request) = run(&JsonBodyParser::new(1024), json_request("")).await else {
            panic!("expected continue");
        };
        assert_eq!(request.extensions().get::<JsonBody>(), Some(&JsonBody(json!({}))));
    }

    #[tokio::test]
    async fn test_malformed_json_fails() {
        match run(&JsonBodyParser::new(1024), json_request(r#"{"email": }"#)).await {
            Flow::Fail(err) => assert_eq!(err.status_code(), StatusCode::BAD_REQUEST),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scalar_rejected() {
        assert!(matches!(
            run(&JsonBodyParser::new(1024), json_request("42")).await,
            Flow::Fail(ApiError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_declared_length_over_limit() {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::CONTENT_LENGTH, "2048")
            .body(Body::from("{}"))
            .unwrap();
        assert!(matches!(
            run(&JsonBodyParser::new(1024), request).await,
            Flow::Fail(ApiError::PayloadTooLarge { size: Some(2048), limit: 1024 })
        ));
    }

    #[tokio::test]
    async fn test_undeclared_length_over_limit() {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(format!(r#"{{"email":"{}@example.com"}}"#, "a".repeat(64))))
            .unwrap();
        assert!(matches!(
            run(&JsonBodyParser::new(16), request).await,
            Flow::Fail(ApiError::PayloadTooLarge { size: None, limit: 16 })
        ));
    }

    #[tokio::test]
    async fn test_non_json_untouched() {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("{not json"))
            .unwrap();
        let Flow::Continue(request) = run(&JsonBodyParser::new(1024), request).await else {
            panic!("expected continue");
        };
        assert!(request.extensions().get::<JsonBody>().is_none());
    }
}
