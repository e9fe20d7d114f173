//! Handler and response types shared by the router and the middleware pipeline.

use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, LOCATION};
use http::StatusCode;
use serde::Serialize;
use serde_json::{json, Value};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use super::RequestContext;

/// Maximum inline response headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated response header storage.
///
/// Header names use `Arc<str>` because they are almost always static strings
/// repeated across responses; values are per-response data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Terminal request handler.
///
/// Any `Fn(&mut RequestContext) -> HandlerResponse` that is `Send + Sync` is a handler,
/// so plain functions and closures can be registered directly.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &mut RequestContext) -> HandlerResponse;
}

impl<F> Handler for F
where
    F: Fn(&mut RequestContext) -> HandlerResponse + Send + Sync,
{
    fn call(&self, ctx: &mut RequestContext) -> HandlerResponse {
        self(ctx)
    }
}

/// Machine readable codes carried by the built-in failure responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    MethodNotAllowed,
    Unauthorized,
    TokenExpired,
    TooManyRequests,
    InternalServerError,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::NotFound => "not_found",
            ErrorCode::MethodNotAllowed => "method_not_allowed",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::TokenExpired => "token_expired",
            ErrorCode::TooManyRequests => "too_many_requests",
            ErrorCode::InternalServerError => "internal_server_error",
        }
    }

    /// HTTP status paired with this code
    #[must_use]
    pub fn status(self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::MethodNotAllowed => 405,
            ErrorCode::Unauthorized | ErrorCode::TokenExpired => 401,
            ErrorCode::TooManyRequests => 429,
            ErrorCode::InternalServerError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response produced by a handler or a short-circuiting middleware
///
/// The body is JSON. A `Value::String` body is sent as `text/plain` and
/// `Value::Null` as an empty body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HandlerResponse {
    /// HTTP status code (200, 404, 500, etc.)
    pub status: u16,
    #[serde(skip_serializing)]
    pub headers: HeaderVec,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: HeaderVec, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// JSON response with the given status
    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, HeaderVec::new(), body)
    }

    /// Plain text response
    #[must_use]
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, HeaderVec::new(), Value::String(body.into()))
    }

    /// Failure response shaped `{"error": "<code>"}` with the code's status
    #[must_use]
    pub fn error(code: ErrorCode) -> Self {
        Self::json(code.status(), json!({ "error": code.as_str() }))
    }

    /// Failure response shaped `{"error": {"code": ..., "message": ...}}`
    #[must_use]
    pub fn error_message(status: u16, code: &str, message: &str) -> Self {
        Self::json(
            status,
            json!({ "error": { "code": code, "message": message } }),
        )
    }

    /// Success envelope shaped `{"data": ...}`
    #[must_use]
    pub fn success(status: u16, data: Value) -> Self {
        Self::json(status, json!({ "data": data }))
    }

    /// 201 with a `Location` header and the success envelope
    #[must_use]
    pub fn created(location: &str, data: Value) -> Self {
        let mut res = Self::success(201, data);
        res.set_header(LOCATION.as_str(), location.to_string());
        res
    }

    #[must_use]
    pub fn no_content() -> Self {
        Self::json(204, Value::Null)
    }

    /// Get a header by name (case-insensitive)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Convert into an `http::Response` for the hosting server.
    ///
    /// Headers that are not valid HTTP header names or values are dropped with a warning.
    #[must_use]
    pub fn into_http(self) -> http::Response<Vec<u8>> {
        let (content_type, bytes) = match self.body {
            Value::Null => (None, Vec::new()),
            Value::String(s) => (Some("text/plain; charset=utf-8"), s.into_bytes()),
            other => (
                Some("application/json"),
                serde_json::to_vec(&other).unwrap_or_default(),
            ),
        };

        let mut res = http::Response::new(bytes);
        *res.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let headers = res.headers_mut();
        if let Some(ct) = content_type {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(header = %name, "Dropping invalid response header"),
            }
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_map_to_status() {
        assert_eq!(ErrorCode::NotFound.status(), 404);
        assert_eq!(ErrorCode::MethodNotAllowed.status(), 405);
        assert_eq!(ErrorCode::TokenExpired.status(), 401);
        assert_eq!(ErrorCode::TooManyRequests.status(), 429);
        assert_eq!(
            serde_json::to_value(ErrorCode::TooManyRequests).unwrap(),
            json!("too_many_requests")
        );
    }

    #[test]
    fn test_error_body_shape() {
        let res = HandlerResponse::error(ErrorCode::Unauthorized);
        assert_eq!(res.status, 401);
        assert_eq!(res.body, json!({ "error": "unauthorized" }));
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut res = HandlerResponse::json(200, json!({}));
        res.set_header("X-Request-ID", "a".to_string());
        res.set_header("x-request-id", "b".to_string());
        assert_eq!(res.headers.len(), 1);
        assert_eq!(res.get_header("X-REQUEST-ID"), Some("b"));
    }

    #[test]
    fn test_created_sets_location() {
        let res = HandlerResponse::created("/users/7", json!({ "id": 7 }));
        assert_eq!(res.status, 201);
        assert_eq!(res.get_header("location"), Some("/users/7"));
        assert_eq!(res.body, json!({ "data": { "id": 7 } }));
    }

    #[test]
    fn test_into_http_json_body() {
        let res = HandlerResponse::json(200, json!({ "ok": true })).into_http();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[CONTENT_TYPE], "application/json");
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({ "ok": true }));
    }

    #[test]
    fn test_into_http_text_and_empty() {
        let res = HandlerResponse::text(200, "pong").into_http();
        assert_eq!(res.body(), b"pong");
        assert!(res.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let res = HandlerResponse::no_content().into_http();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(res.body().is_empty());
        assert!(res.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_into_http_drops_invalid_header() {
        let mut res = HandlerResponse::json(200, json!({}));
        res.set_header("bad header", "x".to_string());
        res.set_header("x-good", "y".to_string());
        let res = res.into_http();
        assert_eq!(res.headers()["x-good"], "y");
        assert_eq!(res.headers().len(), 2);
    }
}
