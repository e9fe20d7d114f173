//! # App Module
//!
//! Assembles a root [`Router`] from an [`AppConfig`]: the default middleware stack,
//! the shared rate limiter and its compaction thread, and the token service.
//!
//! ## Middleware order
//!
//! Outermost first:
//!
//! 1. [`RecoveryMiddleware`]
//! 2. [`RequestIdMiddleware`]
//! 3. [`TracingMiddleware`]
//! 4. [`SecurityHeadersMiddleware`] when `security_headers.enabled`
//! 5. [`RateLimitMiddleware`] when `rate_limit.enabled`
//!
//! Authentication is opt-in per group, since most services have public routes:
//!
//! ```rust
//! use rampart::app::App;
//! use rampart::config::AppConfig;
//! use rampart::dispatcher::{HandlerResponse, RequestContext};
//!
//! let mut config = AppConfig::default();
//! config.jwt.enabled = true;
//! config.jwt.secret = "s3cr3t".to_string();
//!
//! let app = App::from_config(config)?;
//! let mut api = app.router().group("/api");
//! if let Some(auth) = app.auth_middleware() {
//!     api.use_middleware(auth);
//! }
//! api.get("/me", |_: &mut RequestContext| HandlerResponse::no_content())?;
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::middleware::{
    AuthMiddleware, RateLimitMiddleware, RecoveryMiddleware, RequestIdMiddleware,
    SecurityHeadersMiddleware, TracingMiddleware,
};
use crate::rate_limiter::{CompactionHandle, SlidingWindowLimiter};
use crate::router::Router;
use crate::security::TokenService;

#[derive(Debug)]
pub struct App {
    config: AppConfig,
    router: Router,
    tokens: Option<TokenService>,
    limiter: Option<Arc<SlidingWindowLimiter>>,
    compaction: Option<CompactionHandle>,
}

impl App {
    /// Validate `config` and build the root router.
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration or if the compaction thread cannot be spawned.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid application configuration")?;

        let mut router = Router::new();
        router
            .use_middleware(RecoveryMiddleware::new())
            .use_middleware(RequestIdMiddleware::new())
            .use_middleware(TracingMiddleware::new());

        if config.security_headers.enabled {
            let mut headers = SecurityHeadersMiddleware::new().csp(config.security_headers.csp.as_str());
            if let Some(hsts) = &config.security_headers.hsts {
                headers = headers.hsts(hsts.as_str());
            }
            router.use_middleware(headers);
        }

        let (limiter, compaction) = if config.rate_limit.enabled {
            let limiter = Arc::new(SlidingWindowLimiter::new(
                config.rate_limit.requests,
                config.rate_limit.window(),
            ));
            let compaction = limiter
                .start_compaction()
                .context("Failed to spawn rate limiter compaction thread")?;
            router.use_middleware(RateLimitMiddleware::new(Arc::clone(&limiter)));
            (Some(limiter), Some(compaction))
        } else {
            (None, None)
        };

        let tokens = config.jwt.enabled.then(|| {
            TokenService::new(&config.jwt.secret, config.jwt.access_ttl())
                .with_refresh_ttl(config.jwt.refresh_ttl())
        });

        info!(
            env = %config.server.env,
            middleware = ?router.middleware_names(),
            rate_limit = config.rate_limit.enabled,
            jwt = config.jwt.enabled,
            "Application assembled"
        );

        Ok(Self {
            config,
            router,
            tokens,
            limiter,
            compaction,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The root router; use [`Router::group`] for prefixed sub-routers
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Mutable root router, for installing further middleware
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    /// Present when `jwt.enabled`
    #[must_use]
    pub fn token_service(&self) -> Option<&TokenService> {
        self.tokens.as_ref()
    }

    /// Auth middleware bound to [`token_service`](Self::token_service)
    #[must_use]
    pub fn auth_middleware(&self) -> Option<AuthMiddleware> {
        self.tokens.clone().map(AuthMiddleware::new)
    }

    /// Present when `rate_limit.enabled`
    #[must_use]
    pub fn rate_limiter(&self) -> Option<&Arc<SlidingWindowLimiter>> {
        self.limiter.as_ref()
    }

    #[must_use]
    pub fn compaction_running(&self) -> bool {
        self.compaction.as_ref().is_some_and(CompactionHandle::is_running)
    }

    /// See [`Router::serve`]
    pub fn serve(
        &self,
        req: http::Request<Vec<u8>>,
        remote_addr: Option<SocketAddr>,
    ) -> http::Response<Vec<u8>> {
        self.router.serve(req, remote_addr)
    }

    /// Stop background work. Routing keeps working; the limiter just stops
    /// sweeping idle clients. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(compaction) = self.compaction.take() {
            compaction.stop();
            info!("Rate limiter compaction stopped");
        }
    }
}
