use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use crate::dispatcher::{ErrorCode, Handler, HandlerResponse, RequestContext};

/// A layer around the rest of the request chain.
///
/// `handle` either produces a response itself (short-circuit) or calls
/// [`Next::run`] to continue inward, optionally inspecting or rewriting the response
/// on the way out. The first middleware in a list is the outermost layer.
pub trait Middleware: Send + Sync {
    /// Stable name used for route introspection and logs
    fn name(&self) -> &'static str;

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse;
}

/// The remainder of a middleware chain, ending in the terminal handler.
///
/// Consumed by [`run`](Next::run), so every layer reaches the inner chain at most once.
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    handler: &'a dyn Handler,
}

impl<'a> Next<'a> {
    #[must_use]
    pub fn new(middleware: &'a [Arc<dyn Middleware>], handler: &'a dyn Handler) -> Self {
        Self {
            middleware,
            handler,
        }
    }

    /// Run the remaining middleware, then the handler.
    ///
    /// The context records each layer's response status on the way out.
    pub fn run(self, ctx: &mut RequestContext) -> HandlerResponse {
        let res = match self.middleware.split_first() {
            Some((outer, rest)) => outer.handle(ctx, Next::new(rest, self.handler)),
            None => self.handler.call(ctx),
        };
        ctx.commit(res.status);
        res
    }

    /// Number of middleware layers still ahead of the handler
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.middleware.len()
    }
}

/// An ordered middleware list bound to a terminal handler.
///
/// This is what a route stores: composition into the onion happens on every call
/// to [`run`](Pipeline::run), so the list stays inspectable.
#[derive(Clone)]
pub struct Pipeline {
    middleware: Arc<[Arc<dyn Middleware>]>,
    handler: Arc<dyn Handler>,
}

impl Pipeline {
    #[must_use]
    pub fn new(middleware: Arc<[Arc<dyn Middleware>]>, handler: Arc<dyn Handler>) -> Self {
        Self {
            middleware,
            handler,
        }
    }

    pub fn run(&self, ctx: &mut RequestContext) -> HandlerResponse {
        Next::new(&self.middleware, self.handler.as_ref()).run(ctx)
    }

    /// Middleware names, outermost first
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.middleware.iter().map(|m| m.name()).collect()
    }

    #[must_use]
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }

    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }
}

impl Handler for Pipeline {
    fn call(&self, ctx: &mut RequestContext) -> HandlerResponse {
        self.run(ctx)
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("middleware", &self.names())
            .finish_non_exhaustive()
    }
}

/// Several middleware composed into one, in list order.
///
/// Useful for installing a fixed stack (for example authentication plus its
/// bookkeeping) with a single `use_middleware` call.
pub struct Chain {
    name: &'static str,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Chain {
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            middleware: Vec::new(),
        }
    }

    #[must_use]
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    #[must_use]
    pub fn with_shared(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }
}

/// Hands control back to the outer chain once the inner list is exhausted
struct Resume<'a>(Mutex<Option<Next<'a>>>);

impl Handler for Resume<'_> {
    fn call(&self, ctx: &mut RequestContext) -> HandlerResponse {
        let next = self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
        match next {
            Some(next) => next.run(ctx),
            None => HandlerResponse::error(ErrorCode::InternalServerError),
        }
    }
}

impl Middleware for Chain {
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
        let resume = Resume(Mutex::new(Some(next)));
        Next::new(&self.middleware, &resume).run(ctx)
    }
}

/// Middleware built from a closure, see [`from_fn`]
pub struct FnMiddleware<F> {
    name: &'static str,
    f: F,
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestContext, Next<'_>) -> HandlerResponse + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
        (self.f)(ctx, next)
    }
}

/// Adapt a closure into a named middleware
///
/// ```rust
/// use rampart::middleware::from_fn;
///
/// let powered_by = from_fn("powered_by", |ctx, next| {
///     let mut res = next.run(ctx);
///     res.set_header("X-Powered-By", "rampart".to_string());
///     res
/// });
/// ```
pub fn from_fn<F>(name: &'static str, f: F) -> FnMiddleware<F>
where
    F: Fn(&mut RequestContext, Next<'_>) -> HandlerResponse + Send + Sync,
{
    FnMiddleware { name, f }
}
