//! # Dispatcher Module
//!
//! The dispatcher module holds the types every handler and middleware sees while a
//! request is in flight:
//!
//! - [`RequestContext`] - the per-request record (method, path, headers, body,
//!   path parameters, typed key/value store, status bookkeeping)
//! - [`ContextKey`] - typed keys for the context store
//! - [`HandlerResponse`] - status, headers and JSON body produced by a handler
//! - [`ErrorCode`] - the machine readable codes used by the built-in failure responses
//! - [`Handler`] - the terminal request handler trait
//!
//! ## Request Flow
//!
//! 1. The hosting server turns its request into a [`RequestContext`]
//! 2. The router matches method and path, binding path parameters into the context
//! 3. The matched route's middleware pipeline runs, ending in the [`Handler`]
//! 4. The resulting [`HandlerResponse`] is converted back into an `http::Response`
//!
//! ## Example
//!
//! ```rust
//! use rampart::dispatcher::{HandlerResponse, RequestContext};
//! use serde_json::json;
//!
//! fn get_user(ctx: &mut RequestContext) -> HandlerResponse {
//!     let id = ctx.param("id").unwrap_or_default();
//!     HandlerResponse::json(200, json!({ "id": id }))
//! }
//! ```

mod context;
mod core;

pub use context::{ContextKey, RequestContext, REQUEST_ID, USER_CLAIMS};
pub use core::{ErrorCode, Handler, HandlerResponse, HeaderVec, MAX_INLINE_HEADERS};
