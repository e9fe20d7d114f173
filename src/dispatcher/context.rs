use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde::de::DeserializeOwned;
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use crate::ids::RequestId;
use crate::router::ParamVec;
use crate::security::Claims;

/// Typed key into the [`RequestContext`] store.
///
/// The value type is part of the key, so a lookup can never observe a value of the
/// wrong type: `get` on a `ContextKey<RequestId>` always yields a `RequestId`.
///
/// ```rust
/// use rampart::dispatcher::{ContextKey, RequestContext};
/// use http::Method;
///
/// const TENANT: ContextKey<String> = ContextKey::new("tenant");
///
/// let ctx = RequestContext::new(Method::GET, "/");
/// ctx.set(&TENANT, "acme".to_string());
/// assert_eq!(ctx.get(&TENANT).as_deref(), Some("acme"));
/// ```
pub struct ContextKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for ContextKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContextKey").field(&self.name).finish()
    }
}

/// Request id stored by [`RequestIdMiddleware`](crate::middleware::RequestIdMiddleware)
pub const REQUEST_ID: ContextKey<RequestId> = ContextKey::new("request_id");

/// Verified token claims stored by [`AuthMiddleware`](crate::middleware::AuthMiddleware)
pub const USER_CLAIMS: ContextKey<Arc<Claims>> = ContextKey::new("user_claims");

type StoreKey = (&'static str, TypeId);
type Store = HashMap<StoreKey, Box<dyn Any + Send + Sync>>;

/// Per-request record threaded through the middleware chain into the handler.
///
/// The key/value store sits behind its own lock so middleware holding only a shared
/// reference (for example work fanned out to scoped threads within one request) can
/// still read and write it. A context is never shared across requests.
pub struct RequestContext {
    method: Method,
    path: String,
    query: Option<String>,
    headers: HeaderMap,
    body: Vec<u8>,
    remote_addr: Option<SocketAddr>,
    params: ParamVec,
    store: RwLock<Store>,
    status: u16,
    response_started: bool,
}

impl RequestContext {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            headers: HeaderMap::new(),
            body: Vec::new(),
            remote_addr: None,
            params: ParamVec::new(),
            store: RwLock::new(HashMap::new()),
            status: 200,
            response_started: false,
        }
    }

    /// Build a context from an `http::Request` handed over by the hosting server.
    #[must_use]
    pub fn from_http(req: http::Request<Vec<u8>>, remote_addr: Option<SocketAddr>) -> Self {
        let (parts, body) = req.into_parts();
        let mut ctx = Self::new(parts.method, parts.uri.path());
        ctx.query = parts.uri.query().map(str::to_string);
        ctx.headers = parts.headers;
        ctx.body = body;
        ctx.remote_addr = remote_addr;
        ctx
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value by name, if present and valid visible ASCII
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Path parameter by name, verbatim as it appeared in the request path
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: ParamVec) {
        self.params = params;
    }

    /// First query-string value for `name`, form-urlencoded decoded (`%20` and `+`
    /// become spaces)
    #[must_use]
    pub fn query(&self, name: &str) -> Option<Cow<'_, str>> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Raw query string, without the leading `?`
    #[must_use]
    pub fn raw_query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Deserialize the request body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    /// Store a value, replacing any previous value under the same key
    pub fn set<T: Send + Sync + 'static>(&self, key: &ContextKey<T>, value: T) {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store.insert((key.name, TypeId::of::<T>()), Box::new(value));
    }

    /// Clone out the value stored under `key`
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &ContextKey<T>) -> Option<T> {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store
            .get(&(key.name, TypeId::of::<T>()))
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    #[must_use]
    pub fn contains<T: Send + Sync + 'static>(&self, key: &ContextKey<T>) -> bool {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        store.contains_key(&(key.name, TypeId::of::<T>()))
    }

    pub fn remove<T: Send + Sync + 'static>(&self, key: &ContextKey<T>) -> Option<T> {
        let mut store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        store
            .remove(&(key.name, TypeId::of::<T>()))
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Status of the most recent response produced in this request's chain (200 until then)
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether any layer of the chain has produced a response yet
    #[must_use]
    pub fn response_started(&self) -> bool {
        self.response_started
    }

    pub(crate) fn commit(&mut self, status: u16) {
        self.status = status;
        self.response_started = true;
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("params", &self.params)
            .field("status", &self.status)
            .field("response_started", &self.response_started)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;

    const COUNT: ContextKey<u32> = ContextKey::new("count");
    const COUNT_AS_STRING: ContextKey<String> = ContextKey::new("count");

    #[test]
    fn test_store_round_trip() {
        let ctx = RequestContext::new(Method::GET, "/");
        assert!(ctx.get(&COUNT).is_none());
        ctx.set(&COUNT, 3);
        assert_eq!(ctx.get(&COUNT), Some(3));
        ctx.set(&COUNT, 4);
        assert_eq!(ctx.get(&COUNT), Some(4));
        assert_eq!(ctx.remove(&COUNT), Some(4));
        assert!(!ctx.contains(&COUNT));
    }

    #[test]
    fn test_same_name_different_type_do_not_collide() {
        let ctx = RequestContext::new(Method::GET, "/");
        ctx.set(&COUNT, 1);
        ctx.set(&COUNT_AS_STRING, "one".to_string());
        assert_eq!(ctx.get(&COUNT), Some(1));
        assert_eq!(ctx.get(&COUNT_AS_STRING).as_deref(), Some("one"));
    }

    #[test]
    fn test_store_is_shared_across_scoped_threads() {
        let ctx = RequestContext::new(Method::GET, "/");
        std::thread::scope(|s| {
            s.spawn(|| ctx.set(&COUNT, 9));
        });
        assert_eq!(ctx.get(&COUNT), Some(9));
    }

    #[test]
    fn test_from_http_splits_query_and_keeps_headers() {
        let req = http::Request::builder()
            .method(Method::POST)
            .uri("/users/42?limit=10&flag")
            .header("x-real-ip", "10.0.0.1")
            .body(br#"{"name":"bob"}"#.to_vec())
            .unwrap();
        let ctx = RequestContext::from_http(req, None);
        assert_eq!(ctx.method(), &Method::POST);
        assert_eq!(ctx.path(), "/users/42");
        assert_eq!(ctx.query("limit").as_deref(), Some("10"));
        assert_eq!(ctx.query("flag").as_deref(), Some(""));
        assert_eq!(ctx.query("missing"), None);
        assert_eq!(ctx.raw_query(), Some("limit=10&flag"));
        assert_eq!(ctx.header("X-Real-IP"), Some("10.0.0.1"));

        #[derive(Deserialize)]
        struct Body {
            name: String,
        }
        let body: Body = ctx.json().unwrap();
        assert_eq!(body.name, "bob");
    }

    #[test]
    fn test_query_values_are_decoded() {
        let req = http::Request::get("/s?q=a%20b&r=c+d&q=second&k%3D=v%26w")
            .body(Vec::new())
            .unwrap();
        let ctx = RequestContext::from_http(req, None);
        assert_eq!(ctx.query("q").as_deref(), Some("a b"));
        assert_eq!(ctx.query("r").as_deref(), Some("c d"));
        assert_eq!(ctx.query("k=").as_deref(), Some("v&w"));
        assert_eq!(ctx.raw_query(), Some("q=a%20b&r=c+d&q=second&k%3D=v%26w"));
    }

    #[test]
    fn test_param_last_write_wins() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        let mut params = ParamVec::new();
        params.push((Arc::from("id"), "1".to_string()));
        params.push((Arc::from("id"), "2".to_string()));
        ctx.set_params(params);
        assert_eq!(ctx.param("id"), Some("2"));
        assert_eq!(ctx.param("other"), None);
    }

    #[test]
    fn test_commit_tracks_status() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        assert_eq!(ctx.status(), 200);
        assert!(!ctx.response_started());
        ctx.commit(404);
        assert_eq!(ctx.status(), 404);
        assert!(ctx.response_started());
    }
}
