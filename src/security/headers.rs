//! Security response headers.
//!
//! The fixed protective set applied to every response: content security
//! policy, cross-origin isolation, transport security, sniffing and framing
//! protection. Headers a handler already set are left alone.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, HeaderName, HeaderValue},
    response::Response,
};

use crate::http::request::RequestContext;
use crate::pipeline::{Flow, Stage};

const CONTENT_SECURITY_POLICY: &str = "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
form-action 'self';frame-ancestors 'self';img-src 'self' data:;object-src 'none';script-src 'self';\
script-src-attr 'none';style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests";

#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl Default for SecurityHeaders {
    fn default() -> Self {
        let headers = vec![
            (
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(CONTENT_SECURITY_POLICY),
            ),
            (
                HeaderName::from_static("cross-origin-opener-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                HeaderName::from_static("cross-origin-resource-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                HeaderName::from_static("origin-agent-cluster"),
                HeaderValue::from_static("?1"),
            ),
            (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
            (
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            ),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
            (
                HeaderName::from_static("x-download-options"),
                HeaderValue::from_static("noopen"),
            ),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
            (
                HeaderName::from_static("x-permitted-cross-domain-policies"),
                HeaderValue::from_static("none"),
            ),
            (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
        ];
        Self { headers }
    }
}

#[async_trait]
impl Stage for SecurityHeaders {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    async fn handle(&self, request: Request, _ctx: &mut RequestContext) -> Flow {
        Flow::Continue(request)
    }

    fn on_response(&self, _ctx: &RequestContext, response: &mut Response) {
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            headers.entry(name.clone()).or_insert_with(|| value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::response::IntoResponse;

    #[test]
    fn test_headers_applied_without_overwriting() {
        let stage = SecurityHeaders::default();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let ctx = RequestContext::from_request(&request);

        let mut response = ([(header::X_FRAME_OPTIONS, "DENY")], "ok").into_response();
        stage.on_response(&ctx, &mut response);

        let headers = response.headers();
        assert_eq!(headers[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(headers["cross-origin-opener-policy"], "same-origin");
        assert!(headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .starts_with("default-src 'self'"));
    }
}
