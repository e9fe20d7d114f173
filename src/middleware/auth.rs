use std::sync::Arc;
use tracing::{debug, warn};

use super::{Middleware, Next};
use crate::dispatcher::{ErrorCode, HandlerResponse, RequestContext, USER_CLAIMS};
use crate::security::{TokenError, TokenService};

/// Characters of a token kept in logs
const LOGGED_TOKEN_PREFIX: usize = 8;

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The value must split on single spaces into exactly two parts, the first being
/// `bearer` in any case.
fn bearer_token(header: &str) -> Option<&str> {
    let mut parts = header.split(' ');
    let scheme = parts.next()?;
    let token = parts.next()?;
    if parts.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token)
}

fn redact(token: &str) -> String {
    match token.get(..LOGGED_TOKEN_PREFIX) {
        Some(prefix) if token.len() > LOGGED_TOKEN_PREFIX => format!("{prefix}..."),
        _ => "<short>".to_string(),
    }
}

/// Requires a valid bearer token and exposes its claims to inner layers.
///
/// Rejections are 401 with `unauthorized`, or `token_expired` for a correctly
/// signed token past its expiry. On success the claims are stored under
/// [`USER_CLAIMS`].
#[derive(Debug, Clone)]
pub struct AuthMiddleware {
    tokens: TokenService,
}

impl AuthMiddleware {
    #[must_use]
    pub fn new(tokens: TokenService) -> Self {
        Self { tokens }
    }
}

impl Middleware for AuthMiddleware {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
        let Some(token) = ctx.header("authorization").and_then(bearer_token) else {
            debug!(path = %ctx.path(), "Missing or malformed Authorization header");
            return HandlerResponse::error(ErrorCode::Unauthorized);
        };

        match self.tokens.validate(token) {
            Ok(claims) => {
                debug!(subject = %claims.subject, "Token accepted");
                ctx.set(&USER_CLAIMS, Arc::new(claims));
                next.run(ctx)
            }
            Err(TokenError::Expired) => {
                debug!(token = %redact(token), "Token expired");
                HandlerResponse::error(ErrorCode::TokenExpired)
            }
            Err(TokenError::Invalid) => {
                warn!(
                    token = %redact(token),
                    path = %ctx.path(),
                    "Token rejected"
                );
                HandlerResponse::error(ErrorCode::Unauthorized)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("bEaReR abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer"), None);
        assert_eq!(bearer_token("Bearer  abc"), None);
        assert_eq!(bearer_token("Bearer abc def"), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token(""), None);
    }

    #[test]
    fn test_redact_keeps_only_prefix() {
        assert_eq!(redact("eyJhbGciOiJIUzI1NiJ9.payload.sig"), "eyJhbGci...");
        assert_eq!(redact("short"), "<short>");
    }
}
