use serde_json::json;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

use super::{Middleware, Next};
use crate::dispatcher::{ErrorCode, HandlerResponse, RequestContext, REQUEST_ID};

/// Turns a panic anywhere inside the chain into a 500 response.
///
/// Install it first so it wraps every other layer. The response body carries the
/// request id when [`RequestIdMiddleware`](super::RequestIdMiddleware) ran before the
/// panic.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecoveryMiddleware;

impl RecoveryMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

impl Middleware for RecoveryMiddleware {
    fn name(&self) -> &'static str {
        "recovery"
    }

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
        let outcome = catch_unwind(AssertUnwindSafe(|| next.run(&mut *ctx)));
        match outcome {
            Ok(res) => res,
            Err(payload) => {
                let request_id = ctx
                    .get(&REQUEST_ID)
                    .map(|id| id.to_string())
                    .unwrap_or_default();
                error!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    request_id = %request_id,
                    panic = panic_message(payload.as_ref()),
                    "Handler panicked"
                );
                let code = ErrorCode::InternalServerError;
                let res = HandlerResponse::json(
                    code.status(),
                    json!({ "error": code.as_str(), "request_id": request_id }),
                );
                ctx.commit(res.status);
                res
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::Handler;
    use crate::ids::RequestId;
    use http::Method;
    use std::sync::Arc;

    fn boom(_: &mut RequestContext) -> HandlerResponse {
        panic!("boom")
    }

    #[test]
    fn test_panic_becomes_500_with_request_id() {
        let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(RecoveryMiddleware)];
        let handler: &dyn Handler = &boom;
        let mut ctx = RequestContext::new(Method::GET, "/");
        let id = RequestId::new();
        ctx.set(&REQUEST_ID, id);

        let res = Next::new(&middleware, handler).run(&mut ctx);
        assert_eq!(res.status, 500);
        assert_eq!(
            res.body,
            json!({ "error": "internal_server_error", "request_id": id.to_string() })
        );
        assert_eq!(ctx.status(), 500);
    }

    #[test]
    fn test_passes_through_without_panic() {
        let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(RecoveryMiddleware)];
        let ok = |_: &mut RequestContext| HandlerResponse::text(200, "fine");
        let mut ctx = RequestContext::new(Method::GET, "/");
        let res = Next::new(&middleware, &ok).run(&mut ctx);
        assert_eq!(res.status, 200);
    }

    #[test]
    fn test_panic_message_extraction() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
