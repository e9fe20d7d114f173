//! # Router Module
//!
//! The router module maps `(method, path)` pairs to registered routes and runs the
//! matched route's middleware pipeline.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Registering routes with `:name` parameter segments (`/users/:id`)
//! - Matching incoming requests, with literal segments taking precedence over
//!   parameter segments at every level
//! - Extracting path parameters verbatim (no percent-decoding)
//! - Telling an unknown path (404) apart from a known path with the wrong method (405)
//! - Grouping routes under a prefix with group-local middleware
//!
//! ## Architecture
//!
//! Routes live in a segment tree shared by a root router and every group created
//! from it. Registration takes the tree's write lock; dispatch takes the read lock.
//! Each route stores a snapshot of the middleware list of the router that
//! registered it, so adding middleware later never changes existing routes.
//!
//! ## Example
//!
//! ```rust
//! use rampart::dispatcher::{HandlerResponse, RequestContext};
//! use rampart::router::Router;
//! use serde_json::json;
//!
//! let router = Router::new();
//! let api = router.group("/api");
//! api.get("/users/me", |_: &mut RequestContext| {
//!     HandlerResponse::json(200, json!({ "me": true }))
//! })
//! .unwrap();
//!
//! let req = http::Request::get("/api/users/me").body(Vec::new()).unwrap();
//! let res = router.serve(req, None);
//! assert_eq!(res.status(), 200);
//! ```
//!
//! ## Performance
//!
//! Lookup is O(k) in the number of path segments plus backtracking, independent of
//! the number of registered routes. Parameters are collected into a `SmallVec` that
//! stays on the stack for up to eight bindings.

mod core;
mod error;
mod tree;

pub use core::{
    Dispatch, ParamVec, RouteDescriptor, RouteInfo, RouteMatch, Router, MAX_INLINE_PARAMS,
    SUPPORTED_METHODS,
};
pub use error::RouteError;
