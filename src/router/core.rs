//! Router core module - registration and the dispatch hot path.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use serde::Serialize;
use smallvec::SmallVec;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use super::error::RouteError;
use super::tree::PathTree;
use crate::dispatcher::{ErrorCode, Handler, HandlerResponse, RequestContext};
use crate::middleware::{Middleware, Pipeline};

/// Maximum number of path parameters before heap allocation.
/// Most REST APIs have ≤4 path params (e.g., /users/:id/posts/:post_id).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated path parameter storage.
///
/// Param names use `Arc<str>` because they come from the route tree and are shared
/// by every request that matches; values are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Methods accepted by [`Router::register`], also the set probed for 405 detection
pub const SUPPORTED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
];

/// A registered route: method, pattern and the pipeline that serves it.
///
/// The pipeline holds the middleware list exactly as it was on the registering
/// router when the route was added, followed by the terminal handler.
pub struct RouteDescriptor {
    method: Method,
    pattern: String,
    pipeline: Pipeline,
}

impl RouteDescriptor {
    pub(crate) fn new(
        method: Method,
        pattern: String,
        middleware: Arc<[Arc<dyn Middleware>]>,
        handler: Arc<dyn Handler>,
    ) -> Self {
        Self {
            method,
            pattern,
            pipeline: Pipeline::new(middleware, handler),
        }
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Full pattern including any group prefix, e.g. `/api/users/:id`
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            method: self.method.to_string(),
            pattern: self.pattern.clone(),
            middleware: self.pipeline.names(),
        }
    }
}

impl fmt::Debug for RouteDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteDescriptor")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("middleware", &self.pipeline.names())
            .finish_non_exhaustive()
    }
}

/// Introspection view of a registered route, e.g. for documentation generators
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct RouteInfo {
    pub method: String,
    pub pattern: String,
    /// Middleware names, outermost first
    pub middleware: Vec<&'static str>,
}

/// Result of successfully matching a request to a route
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// The matched route (shared, so repeated lookups yield the same descriptor)
    pub route: Arc<RouteDescriptor>,
    /// Path parameters extracted from the URL (e.g., `:id` → `("id", "123")`)
    pub path_params: ParamVec,
}

impl RouteMatch {
    /// Get a path parameter by name (last write wins)
    #[inline]
    #[must_use]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Outcome of [`Router::dispatch`]
#[derive(Debug, Clone)]
pub enum Dispatch {
    Matched(RouteMatch),
    /// The path is registered, but not for the requested method
    MethodNotAllowed,
    NotFound,
}

#[derive(Default)]
struct Fallbacks {
    not_found: Option<Arc<dyn Handler>>,
    method_not_allowed: Option<Arc<dyn Handler>>,
}

/// Route table with per-router middleware and prefix grouping.
///
/// A root router and all groups derived from it share one [`PathTree`] and one
/// pair of fallback handlers. Each router keeps its own middleware list; routes
/// capture that list when they are registered.
///
/// ```rust
/// use rampart::dispatcher::{HandlerResponse, RequestContext};
/// use rampart::router::{Dispatch, Router};
/// use http::Method;
/// use serde_json::json;
///
/// let router = Router::new();
/// router
///     .get("/users/:id", |ctx: &mut RequestContext| {
///         HandlerResponse::json(200, json!({ "id": ctx.param("id") }))
///     })
///     .unwrap();
///
/// match router.dispatch(&Method::GET, "/users/42") {
///     Dispatch::Matched(m) => assert_eq!(m.get_path_param("id"), Some("42")),
///     other => panic!("unexpected {other:?}"),
/// }
/// ```
pub struct Router {
    prefix: String,
    tree: Arc<RwLock<PathTree>>,
    middleware: Vec<Arc<dyn Middleware>>,
    fallbacks: Arc<RwLock<Fallbacks>>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self {
            prefix: String::new(),
            tree: Arc::new(RwLock::new(PathTree::new())),
            middleware: Vec::new(),
            fallbacks: Arc::new(RwLock::new(Fallbacks::default())),
        }
    }

    /// Create a router for `prefix` sharing this router's route table and fallbacks.
    ///
    /// The group starts with a copy of this router's current middleware list; later
    /// `use_middleware` calls on either router do not affect the other.
    #[must_use]
    pub fn group(&self, prefix: &str) -> Router {
        Router {
            prefix: join_path(&self.prefix, prefix),
            tree: Arc::clone(&self.tree),
            middleware: self.middleware.clone(),
            fallbacks: Arc::clone(&self.fallbacks),
        }
    }

    /// Prefix applied to every pattern registered through this router
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Append middleware to this router's list.
    ///
    /// Only routes registered after this call run it; the first middleware added is
    /// the outermost layer.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.use_shared(Arc::new(middleware))
    }

    /// Append an already shared middleware instance
    pub fn use_shared(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        debug!(
            prefix = %self.prefix,
            middleware = middleware.name(),
            "Middleware added"
        );
        self.middleware.push(middleware);
        self
    }

    /// Names of the middleware currently installed on this router, outermost first
    #[must_use]
    pub fn middleware_names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    /// Register `handler` for `method` at `pattern` (relative to this router's prefix).
    ///
    /// Registering the same method and pattern again replaces the earlier route.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`] when the method is not supported, a segment is a bare
    /// `:`, or a different parameter name already occupies a position in the pattern.
    pub fn register<H: Handler + 'static>(
        &self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        if !SUPPORTED_METHODS.contains(&method) {
            return Err(RouteError::UnsupportedMethod {
                method: method.to_string(),
            });
        }

        let full = join_path(&self.prefix, pattern);
        let route = Arc::new(RouteDescriptor::new(
            method,
            full,
            Arc::from(self.middleware.as_slice()),
            Arc::new(handler),
        ));

        let mut tree = self.tree.write().unwrap_or_else(PoisonError::into_inner);
        let replaced = tree.insert(Arc::clone(&route))?;
        debug!(
            method = %route.method(),
            pattern = %route.pattern(),
            middleware = ?route.pipeline().names(),
            replaced = replaced.is_some(),
            "Route registered"
        );
        Ok(())
    }

    /// Register a GET route
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn get<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouteError> {
        self.register(Method::GET, pattern, handler)
    }

    /// Register a POST route
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn post<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouteError> {
        self.register(Method::POST, pattern, handler)
    }

    /// Register a PUT route
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn put<H: Handler + 'static>(&self, pattern: &str, handler: H) -> Result<(), RouteError> {
        self.register(Method::PUT, pattern, handler)
    }

    /// Register a DELETE route
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn delete<H: Handler + 'static>(
        &self,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        self.register(Method::DELETE, pattern, handler)
    }

    /// Register a PATCH route
    ///
    /// # Errors
    ///
    /// See [`Router::register`].
    pub fn patch<H: Handler + 'static>(
        &self,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        self.register(Method::PATCH, pattern, handler)
    }

    /// Replace the handler used for unmatched paths (shared by every group)
    pub fn set_not_found<H: Handler + 'static>(&self, handler: H) {
        let mut fallbacks = self.fallbacks.write().unwrap_or_else(PoisonError::into_inner);
        fallbacks.not_found = Some(Arc::new(handler));
    }

    /// Replace the handler used when the path exists under other methods only
    pub fn set_method_not_allowed<H: Handler + 'static>(&self, handler: H) {
        let mut fallbacks = self.fallbacks.write().unwrap_or_else(PoisonError::into_inner);
        fallbacks.method_not_allowed = Some(Arc::new(handler));
    }

    /// Exact-method match. A pure read of the route table.
    #[must_use]
    pub fn lookup(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        tree.find(method, path)
            .map(|(route, path_params)| RouteMatch { route, path_params })
    }

    /// Match a request, distinguishing an unknown path from a method mismatch
    #[must_use]
    pub fn dispatch(&self, method: &Method, path: &str) -> Dispatch {
        if let Some(matched) = self.lookup(method, path) {
            debug!(
                method = %method,
                path = %path,
                pattern = %matched.route.pattern(),
                params = matched.path_params.len(),
                "Route matched"
            );
            return Dispatch::Matched(matched);
        }

        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        let other_method = SUPPORTED_METHODS
            .iter()
            .filter(|m| *m != method)
            .any(|m| tree.find(m, path).is_some());

        if other_method {
            debug!(method = %method, path = %path, "Method not allowed");
            Dispatch::MethodNotAllowed
        } else {
            debug!(method = %method, path = %path, "No route matched");
            Dispatch::NotFound
        }
    }

    /// Run the request through the matched route's pipeline, or the fallbacks.
    ///
    /// Fallback handlers run without any middleware.
    pub fn handle(&self, ctx: &mut RequestContext) -> HandlerResponse {
        let method = ctx.method().clone();
        let outcome = self.dispatch(&method, ctx.path());
        match outcome {
            Dispatch::Matched(RouteMatch { route, path_params }) => {
                ctx.set_params(path_params);
                route.pipeline().run(ctx)
            }
            Dispatch::MethodNotAllowed => {
                let handler = self
                    .fallbacks
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .method_not_allowed
                    .clone();
                run_fallback(ctx, handler, ErrorCode::MethodNotAllowed)
            }
            Dispatch::NotFound => {
                let handler = self
                    .fallbacks
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .not_found
                    .clone();
                run_fallback(ctx, handler, ErrorCode::NotFound)
            }
        }
    }

    /// Entry point for a hosting HTTP server.
    ///
    /// The query string is kept on the context but not used for matching.
    pub fn serve(
        &self,
        req: http::Request<Vec<u8>>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<Vec<u8>> {
        let mut ctx = RequestContext::from_http(req, remote_addr);
        self.handle(&mut ctx).into_http()
    }

    /// Every registered route, sorted by pattern then method
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        let tree = self.tree.read().unwrap_or_else(PoisonError::into_inner);
        let mut routes: Vec<RouteInfo> = tree.routes().iter().map(|r| r.info()).collect();
        routes.sort_by(|a, b| {
            a.pattern
                .cmp(&b.pattern)
                .then_with(|| a.method.cmp(&b.method))
        });
        routes
    }

    /// Log every registered route at debug level
    pub fn dump_routes(&self) {
        let routes = self.routes();
        debug!(count = routes.len(), "Route table");
        for route in routes {
            debug!(
                method = %route.method,
                pattern = %route.pattern,
                middleware = ?route.middleware,
                "Route"
            );
        }
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("prefix", &self.prefix)
            .field("middleware", &self.middleware_names())
            .finish_non_exhaustive()
    }
}

fn run_fallback(
    ctx: &mut RequestContext,
    handler: Option<Arc<dyn Handler>>,
    code: ErrorCode,
) -> HandlerResponse {
    let res = match handler {
        Some(handler) => handler.call(ctx),
        None => HandlerResponse::error(code),
    };
    ctx.commit(res.status);
    res
}

/// Join a router prefix and a pattern into an absolute pattern
pub(super) fn join_path(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let pattern = pattern.trim_start_matches('/');
    match (prefix.is_empty(), pattern.is_empty()) {
        (true, true) => "/".to_string(),
        (true, false) => format!("/{pattern}"),
        (false, true) => ensure_leading_slash(prefix),
        (false, false) => format!("{}/{pattern}", ensure_leading_slash(prefix)),
    }
}

fn ensure_leading_slash(s: &str) -> String {
    if s.starts_with('/') {
        s.to_string()
    } else {
        format!("/{s}")
    }
}
