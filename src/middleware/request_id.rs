use super::{Middleware, Next};
use crate::dispatcher::{HandlerResponse, RequestContext, REQUEST_ID};
use crate::ids::RequestId;

/// Response header carrying the request correlation id
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Assigns every request a fresh ULID.
///
/// The id is stored under [`REQUEST_ID`] for inner layers and handlers, and echoed in
/// the `X-Request-ID` response header, including on short-circuited responses from
/// inner middleware.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestIdMiddleware;

impl RequestIdMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
        let id = RequestId::new();
        ctx.set(&REQUEST_ID, id);
        let mut res = next.run(ctx);
        res.set_header(REQUEST_ID_HEADER, id.to_string());
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::ErrorCode;
    use crate::middleware::from_fn;
    use http::Method;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_id_is_stored_and_echoed() {
        let seen = Arc::new(Mutex::new(None));
        let seen_in = Arc::clone(&seen);
        let handler = move |ctx: &mut RequestContext| {
            *seen_in.lock().unwrap() = ctx.get(&REQUEST_ID);
            HandlerResponse::no_content()
        };
        let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(RequestIdMiddleware)];

        let mut ctx = RequestContext::new(Method::GET, "/");
        let res = Next::new(&middleware, &handler).run(&mut ctx);

        let stored = seen.lock().unwrap().expect("id stored before handler ran");
        assert_eq!(res.get_header("x-request-id"), Some(stored.to_string().as_str()));
    }

    #[test]
    fn test_header_set_on_short_circuit() {
        let middleware: Vec<Arc<dyn Middleware>> = vec![
            Arc::new(RequestIdMiddleware),
            Arc::new(from_fn("deny", |_ctx, _next| {
                HandlerResponse::error(ErrorCode::Unauthorized)
            })),
        ];
        let handler = |_: &mut RequestContext| HandlerResponse::no_content();
        let mut ctx = RequestContext::new(Method::GET, "/");
        let res = Next::new(&middleware, &handler).run(&mut ctx);
        assert_eq!(res.status, 401);
        assert!(res.get_header(REQUEST_ID_HEADER).is_some());
    }

    #[test]
    fn test_ids_differ_per_request() {
        let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(RequestIdMiddleware)];
        let handler = |_: &mut RequestContext| HandlerResponse::no_content();
        let a = Next::new(&middleware, &handler).run(&mut RequestContext::new(Method::GET, "/"));
        let b = Next::new(&middleware, &handler).run(&mut RequestContext::new(Method::GET, "/"));
        assert_ne!(a.get_header(REQUEST_ID_HEADER), b.get_header(REQUEST_ID_HEADER));
    }
}
