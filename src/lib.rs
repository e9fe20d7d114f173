//! # Rampart
//!
//! **Rampart** is the request-dispatch core of an embeddable HTTP toolkit: a path
//! tree router with `:name` parameters, onion-style middleware, a sliding-window
//! rate limiter and HMAC-signed bearer tokens.
//!
//! It does not own a socket. A hosting server converts each request to an
//! `http::Request<Vec<u8>>` and calls [`Router::serve`] (or builds a
//! [`RequestContext`](dispatcher::RequestContext) and calls [`Router::handle`]).
//!
//! ## Architecture
//!
//! - **[`router`]** - path tree, route registration, groups and fallbacks
//! - **[`dispatcher`]** - handler trait, request context and response types
//! - **[`middleware`]** - middleware trait, pipeline composition and built-ins
//! - **[`rate_limiter`]** - per-key sliding-window limiter with background compaction
//! - **[`security`]** - token issuance and validation
//! - **[`config`]** / **[`logging`]** / **[`app`]** - configuration, `tracing` setup and assembly
//!
//! ## Request flow
//!
//! ```text
//! serve(req) ─► RequestContext ─► Router::dispatch(method, path)
//!                                   │
//!                 ┌─────────────────┼──────────────────────┐
//!              Matched       MethodNotAllowed           NotFound
//!                 │                 │                      │
//!    route middleware (outer→inner) │                      │
//!                 │                 │                      │
//!              handler         405 fallback           404 fallback
//! ```
//!
//! ## Example
//!
//! ```rust
//! use rampart::dispatcher::{HandlerResponse, RequestContext};
//! use rampart::middleware::RequestIdMiddleware;
//! use rampart::Router;
//! use serde_json::json;
//!
//! let mut router = Router::new();
//! router.use_middleware(RequestIdMiddleware::new());
//! router.get("/users/:id", |ctx: &mut RequestContext| {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     HandlerResponse::success(200, json!({ "id": id }))
//! })?;
//!
//! let req = http::Request::get("/users/42").body(Vec::new())?;
//! let res = router.serve(req, None);
//! assert_eq!(res.status(), 200);
//! assert!(res.headers().contains_key("x-request-id"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod app;
pub mod config;
pub mod dispatcher;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod rate_limiter;
pub mod router;
pub mod security;

pub use app::App;
pub use config::AppConfig;
pub use dispatcher::{ErrorCode, Handler, HandlerResponse, RequestContext};
pub use ids::RequestId;
pub use middleware::{Middleware, Next};
pub use rate_limiter::SlidingWindowLimiter;
pub use router::{RouteError, Router};
pub use security::{Claims, TokenError, TokenService};
