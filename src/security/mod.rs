//! # Security Module
//!
//! Stateless issuance and verification of signed, expiring claim sets.
//!
//! ## Overview
//!
//! - [`issue_token`] signs `{sub, iat, exp, ...extra}` with HS256
//! - [`validate_token`] verifies the signature and expiry and returns typed [`Claims`]
//! - [`TokenService`] binds a secret and default lifetimes for use by an application
//!
//! Validation distinguishes an expired token ([`TokenError::Expired`]) from every
//! other failure ([`TokenError::Invalid`]) so the authentication middleware can tell
//! clients to refresh instead of re-authenticate.
//!
//! ## Example
//!
//! ```rust
//! use rampart::security::{issue_token, validate_token, TokenError};
//! use chrono::Duration;
//! use serde_json::json;
//!
//! let extra = json!({ "role": "admin" }).as_object().cloned();
//! let token = issue_token("bob", Duration::hours(1), "s3cr3t", extra).unwrap();
//!
//! let claims = validate_token(&token, "s3cr3t").unwrap();
//! assert_eq!(claims.subject, "bob");
//! assert_eq!(claims.get_str("role"), Some("admin"));
//!
//! assert_eq!(validate_token(&token, "wrong").unwrap_err(), TokenError::Invalid);
//! ```
//!
//! The secret is never logged; [`TokenService`]'s `Debug` output redacts it.

mod claims;
mod token;

pub use claims::Claims;
pub use token::{
    issue_token, validate_token, IssueError, TokenError, TokenService, RESERVED_CLAIMS,
};
