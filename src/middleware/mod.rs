//! # Middleware Module
//!
//! Middleware wraps the rest of a route's chain. Each layer receives the request
//! context and a [`Next`] for the inner chain, and may short-circuit with its own
//! response instead of calling it.
//!
//! ## Ordering
//!
//! The first middleware installed on a router is the outermost layer: it runs first
//! on the way in and last on the way out. A route keeps the list that was installed
//! when it was registered.
//!
//! ## Built-in middleware
//!
//! | Middleware | Purpose |
//! |---|---|
//! | [`RecoveryMiddleware`] | panics become 500 `internal_server_error` |
//! | [`RequestIdMiddleware`] | ULID correlation id in the context and `X-Request-ID` |
//! | [`TracingMiddleware`] | access log span and event per request |
//! | [`SecurityHeadersMiddleware`] | nosniff, frame, XSS, referrer, CSP and HSTS headers |
//! | [`RateLimitMiddleware`] | 429 `too_many_requests` per client key |
//! | [`AuthMiddleware`] | bearer token validation, claims under `USER_CLAIMS` |
//!
//! ## Custom middleware
//!
//! ```rust
//! use rampart::dispatcher::{HandlerResponse, RequestContext};
//! use rampart::middleware::{Middleware, Next};
//!
//! struct Timing;
//!
//! impl Middleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
//!         let start = std::time::Instant::now();
//!         let mut res = next.run(ctx);
//!         res.set_header("X-Elapsed-Us", start.elapsed().as_micros().to_string());
//!         res
//!     }
//! }
//! ```

mod auth;
mod core;
mod rate_limit;
mod recovery;
mod request_id;
mod security_headers;
mod tracing;

pub use auth::AuthMiddleware;
pub use core::{from_fn, Chain, FnMiddleware, Middleware, Next, Pipeline};
pub use rate_limit::{client_key, RateLimitMiddleware};
pub use recovery::RecoveryMiddleware;
pub use request_id::{RequestIdMiddleware, REQUEST_ID_HEADER};
pub use security_headers::{SecurityHeadersMiddleware, DEFAULT_CSP, DEFAULT_HSTS};
pub use tracing::TracingMiddleware;
