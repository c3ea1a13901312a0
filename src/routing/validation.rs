//! Request body validation.
//!
//! A [`Validator`] checks one field of the parsed JSON body and reports
//! field errors. [`require_email`] wraps a route so the handler only runs
//! when the body carries a valid `email`.

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use validator::ValidateEmail;

use crate::http::body::JsonBody;

const INVALID_VALUE: &str = "Invalid value";

/// One failed check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: String,
    /// Submitted value, absent when the field was missing.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub value: Option<Value>,
    pub msg: String,
    pub path: String,
    pub location: String,
}

/// 400 payload listing every field error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Email,
}

impl Rule {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Rule::Email => value.as_str().is_some_and(|s| s.validate_email()),
        }
    }
}

/// Checks a single top-level body field against a rule.
#[derive(Debug, Clone)]
pub struct Validator {
    field: &'static str,
    rule: Rule,
}

impl Validator {
    pub fn email(field: &'static str) -> Self {
        Self {
            field,
            rule: Rule::Email,
        }
    }

    /// Empty on success.
    pub fn validate(&self, body: &Value) -> Vec<FieldError> {
        let value = body.get(self.field);
        if value.is_some_and(|v| self.rule.accepts(v)) {
            return Vec::new();
        }

        vec![FieldError {
            kind: "field".to_string(),
            value: value.cloned(),
            msg: INVALID_VALUE.to_string(),
            path: self.field.to_string(),
            location: "body".to_string(),
        }]
    }
}

/// Route middleware: short-circuits with 400 unless `email` is valid.
pub async fn require_email(request: Request, next: Next) -> Response {
    let empty = Value::Object(Default::default());
    let body = request
        .extensions()
        .get::<JsonBody>()
        .map_or(&empty, |JsonBody(value)| value);

    let errors = Validator::email("email").validate(body);
    if !errors.is_empty() {
        tracing::debug!(errors = errors.len(), "Validation failed");
        return (StatusCode::BAD_REQUEST, Json(ValidationErrors { errors })).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_email() {
        let validator = Validator::email("email");
        assert!(validator.validate(&json!({"email": "user@example.com"})).is_empty());
    }

    #[test]
    fn test_invalid_email() {
        let errors = Validator::email("email").validate(&json!({"email": "not-an-email"}));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "email");
        assert_eq!(errors[0].msg, "Invalid value");
        assert_eq!(errors[0].value, Some(json!("not-an-email")));
    }

    #[test]
    fn test_missing_and_non_string() {
        let validator = Validator::email("email");

        let missing = validator.validate(&json!({}));
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].value, None);

        assert_eq!(validator.validate(&json!({"email": 42})).len(), 1);
        assert_eq!(validator.validate(&json!({"email": ""})).len(), 1);
        assert_eq!(validator.validate(&json!(["user@example.com"])).len(), 1);
    }

    #[test]
    fn test_error_shape() {
        let errors = Validator::email("email").validate(&json!({}));
        let serialized = serde_json::to_value(&errors[0]).unwrap();
        assert_eq!(
            serialized,
            json!({"type": "field", "msg": "Invalid value", "path": "email", "location": "body"})
        );
    }
}
