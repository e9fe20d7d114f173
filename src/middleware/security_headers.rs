use super::{Middleware, Next};
use crate::dispatcher::{HandlerResponse, RequestContext};

/// Default `Content-Security-Policy`
pub const DEFAULT_CSP: &str = "default-src 'self';";

/// Default `Strict-Transport-Security`
pub const DEFAULT_HSTS: &str = "max-age=31536000; includeSubDomains";

const FIXED_HEADERS: [(&str, &str); 4] = [
    ("X-Content-Type-Options", "nosniff"),
    ("X-Frame-Options", "DENY"),
    ("X-XSS-Protection", "1; mode=block"),
    ("Referrer-Policy", "no-referrer"),
];

/// Adds browser hardening headers to every response.
///
/// A header the handler already set is left as is, so individual routes can relax
/// a policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityHeadersMiddleware {
    csp: Option<String>,
    hsts: Option<String>,
}

impl Default for SecurityHeadersMiddleware {
    fn default() -> Self {
        Self {
            csp: Some(DEFAULT_CSP.to_string()),
            hsts: Some(DEFAULT_HSTS.to_string()),
        }
    }
}

impl SecurityHeadersMiddleware {
    /// Only the fixed headers; no CSP or HSTS
    #[must_use]
    pub fn new() -> Self {
        Self {
            csp: None,
            hsts: None,
        }
    }

    /// Set `Content-Security-Policy`; an empty value disables it
    #[must_use]
    pub fn csp(mut self, policy: impl Into<String>) -> Self {
        self.csp = Some(policy.into()).filter(|p| !p.is_empty());
        self
    }

    /// Set `Strict-Transport-Security`; an empty value disables it
    #[must_use]
    pub fn hsts(mut self, policy: impl Into<String>) -> Self {
        self.hsts = Some(policy.into()).filter(|p| !p.is_empty());
        self
    }
}

fn set_if_absent(res: &mut HandlerResponse, name: &str, value: &str) {
    if res.get_header(name).is_none() {
        res.set_header(name, value.to_string());
    }
}

impl Middleware for SecurityHeadersMiddleware {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> HandlerResponse {
        let mut res = next.run(ctx);
        for (name, value) in FIXED_HEADERS {
            set_if_absent(&mut res, name, value);
        }
        if let Some(csp) = &self.csp {
            set_if_absent(&mut res, "Content-Security-Policy", csp);
        }
        if let Some(hsts) = &self.hsts {
            set_if_absent(&mut res, "Strict-Transport-Security", hsts);
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use std::sync::Arc;

    fn run(mw: SecurityHeadersMiddleware, handler: &dyn crate::dispatcher::Handler) -> HandlerResponse {
        let middleware: Vec<Arc<dyn Middleware>> = vec![Arc::new(mw)];
        let mut ctx = RequestContext::new(Method::GET, "/");
        Next::new(&middleware, handler).run(&mut ctx)
    }

    #[test]
    fn test_defaults_include_csp_and_hsts() {
        let res = run(SecurityHeadersMiddleware::default(), &|_: &mut RequestContext| {
            HandlerResponse::no_content()
        });
        assert_eq!(res.get_header("x-content-type-options"), Some("nosniff"));
        assert_eq!(res.get_header("x-frame-options"), Some("DENY"));
        assert_eq!(res.get_header("x-xss-protection"), Some("1; mode=block"));
        assert_eq!(res.get_header("referrer-policy"), Some("no-referrer"));
        assert_eq!(res.get_header("content-security-policy"), Some(DEFAULT_CSP));
        assert_eq!(res.get_header("strict-transport-security"), Some(DEFAULT_HSTS));
    }

    #[test]
    fn test_new_omits_optional_policies() {
        let res = run(SecurityHeadersMiddleware::new().csp(""), &|_: &mut RequestContext| {
            HandlerResponse::no_content()
        });
        assert!(res.get_header("content-security-policy").is_none());
        assert!(res.get_header("strict-transport-security").is_none());
        assert_eq!(res.headers.len(), 4);
    }

    #[test]
    fn test_handler_headers_win() {
        let res = run(SecurityHeadersMiddleware::default(), &|_: &mut RequestContext| {
            let mut res = HandlerResponse::no_content();
            res.set_header("X-Frame-Options", "SAMEORIGIN".to_string());
            res
        });
        assert_eq!(res.get_header("x-frame-options"), Some("SAMEORIGIN"));
    }
}
