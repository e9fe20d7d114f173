use std::sync::Arc;
use tracing::warn;

use super::{Middleware, Next};
use crate::dispatcher::{ErrorCode, HandlerResponse, RequestContext};
use crate::rate_limiter::SlidingWindowLimiter;

/// Key used to throttle a request.
///
/// `X-Forwarded-For` verbatim, else `X-Real-IP`, else the peer address, else
/// `"unknown"`. Both headers are client controlled, so only trust them behind a
/// proxy that overwrites them.
#[must_use]
pub fn client_key(ctx: &RequestContext) -> String {
    ["x-forwarded-for", "x-real-ip"]
        .into_iter()
        .find_map(|name| ctx.header(name).filter(|v| !v.is_empty()))
        .map(str::to_string)
        .or_else(|| ctx.remote_addr().map(|addr| addr.to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Rejects requests over the limiter's budget with 429 `too_many_requests`.
#[derive(Debug, Clone)]
pub struct RateLimitMiddleware {
    limiter: Arc<SlidingWindowLimiter>,
}

impl RateLimitMiddleware {
    #[must_use]
    pub fn new(limiter: Arc<SlidingWindowLimiter>) -> Self {
        Self { limiter }
    }

    #[must_use]
    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }
}

impl Middleware for RateLimitMiddleware {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
        let key = client_key(ctx);
        if self.limiter.allow(&key) {
            return next.run(ctx);
        }
        warn!(
            client = %key,
            method = %ctx.method(),
            path = %ctx.path(),
            limit = self.limiter.limit(),
            window_ms = self.limiter.window().as_millis() as u64,
            "Rate limit exceeded"
        );
        HandlerResponse::error(ErrorCode::TooManyRequests)
    }
}
