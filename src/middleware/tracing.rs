use std::time::Instant;

use tracing::{info, info_span, warn};

use super::{Middleware, Next};
use crate::dispatcher::{HandlerResponse, RequestContext, REQUEST_ID};

/// Access log: one `info` event per request inside a `request` span.
///
/// Install after [`RequestIdMiddleware`](super::RequestIdMiddleware) to get the request
/// id on the span. Server errors (5xx) are logged at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl TracingMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for TracingMiddleware {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
        let request_id = ctx
            .get(&REQUEST_ID)
            .map(|id| id.to_string())
            .unwrap_or_default();
        let span = info_span!(
            "request",
            method = %ctx.method(),
            path = %ctx.path(),
            request_id = %request_id,
        );
        let _guard = span.enter();

        let start = Instant::now();
        let res = next.run(ctx);
        let latency_us = start.elapsed().as_micros() as u64;

        if res.status >= 500 {
            warn!(status = res.status, latency_us, "Request failed");
        } else {
            info!(status = res.status, latency_us, "Request completed");
        }
        res
    }
}
