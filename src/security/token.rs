//! HMAC-signed access tokens (JWT)
//!
//! Tokens carry `sub`, `iat` and `exp` (Unix seconds) plus caller supplied claims.
//! Issuance always signs with HS256; validation accepts the whole HMAC family
//! (HS256, HS384, HS512) and nothing else.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::Claims;

/// Claims set by the issuer that callers may not supply
pub const RESERVED_CLAIMS: [&str; 3] = ["sub", "exp", "iat"];

const HMAC_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Token issuance error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueError {
    /// An extra claim uses a name the issuer sets itself (`sub`, `exp`, `iat`)
    ReservedClaim(String),
    /// `now + ttl` is outside the representable time range
    TtlOutOfRange,
    /// The token could not be signed
    Signing(String),
}

impl fmt::Display for IssueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueError::ReservedClaim(name) => {
                write!(f, "token issue error: claim '{name}' is reserved")
            }
            IssueError::TtlOutOfRange => write!(f, "token issue error: ttl out of range"),
            IssueError::Signing(e) => write!(f, "token issue error: signing failed: {e}"),
        }
    }
}

impl std::error::Error for IssueError {}

/// Token validation outcome other than success
///
/// A well-formed, correctly signed token past its expiry is [`Expired`](TokenError::Expired);
/// everything else (bad signature, wrong algorithm, malformed claims) is
/// [`Invalid`](TokenError::Invalid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Invalid,
    Expired,
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Invalid => write!(f, "invalid token"),
            TokenError::Expired => write!(f, "expired token"),
        }
    }
}

impl std::error::Error for TokenError {}

/// Issue an HS256 token for `subject` expiring `ttl` from now.
///
/// A negative `ttl` yields a token that is already expired.
///
/// # Errors
///
/// [`IssueError::ReservedClaim`] if `extra` contains `sub`, `exp` or `iat`;
/// [`IssueError::TtlOutOfRange`] if the expiry overflows; [`IssueError::Signing`] if
/// encoding fails.
pub fn issue_token(
    subject: &str,
    ttl: Duration,
    secret: &str,
    extra: Option<Map<String, Value>>,
) -> Result<String, IssueError> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or(IssueError::TtlOutOfRange)?;

    let mut payload = Map::new();
    if let Some(extra) = extra {
        if let Some(reserved) = extra
            .keys()
            .find(|k| RESERVED_CLAIMS.contains(&k.as_str()))
        {
            return Err(IssueError::ReservedClaim(reserved.clone()));
        }
        payload.extend(extra);
    }
    payload.insert("sub".to_string(), Value::from(subject));
    payload.insert("iat".to_string(), Value::from(now.timestamp()));
    payload.insert("exp".to_string(), Value::from(expires_at.timestamp()));

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &payload,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| IssueError::Signing(e.to_string()))
}

/// Verify `token` against `secret` and extract its claims.
///
/// The token must be signed with an HMAC algorithm, carry a string `sub`, and have an
/// `exp` strictly in the future (no leeway). `scopes` is only read from an array, keeping
/// its string entries; any other shape is ignored.
///
/// # Errors
///
/// [`TokenError::Expired`] for a correctly signed token past its expiry,
/// [`TokenError::Invalid`] for anything else.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.algorithms = HMAC_ALGORITHMS.to_vec();
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_aud = false;
    validation.set_required_spec_claims(&["exp"]);

    let data = jsonwebtoken::decode::<Map<String, Value>>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        kind => {
            debug!(error = ?kind, "Token rejected");
            TokenError::Invalid
        }
    })?;

    let mut claims = data.claims;
    let expires_at = claims
        .remove("exp")
        .as_ref()
        .and_then(unix_seconds)
        .ok_or(TokenError::Invalid)?;
    // The library accepts exp == now; a token is only valid strictly before its expiry
    if expires_at <= Utc::now() {
        return Err(TokenError::Expired);
    }

    let subject = match claims.remove("sub") {
        Some(Value::String(sub)) => sub,
        _ => return Err(TokenError::Invalid),
    };
    let issued_at = claims.remove("iat").as_ref().and_then(unix_seconds);
    // Only an array is read as scopes; other shapes and non-string entries are dropped
    let scopes = match claims.remove("scopes") {
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    };

    Ok(Claims {
        subject,
        issued_at,
        expires_at,
        scopes,
        extra: claims,
    })
}

fn unix_seconds(v: &Value) -> Option<DateTime<Utc>> {
    let secs = v.as_i64().or_else(|| v.as_f64().map(|f| f as i64))?;
    DateTime::<Utc>::from_timestamp(secs, 0)
}

/// Issues and validates tokens with one shared secret.
///
/// Cheap to clone; holds no per-token state.
#[derive(Clone)]
pub struct TokenService {
    secret: Arc<str>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(secret: &str, access_ttl: Duration) -> Self {
        Self {
            secret: Arc::from(secret),
            access_ttl,
            refresh_ttl: Duration::days(7),
        }
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, refresh_ttl: Duration) -> Self {
        self.refresh_ttl = refresh_ttl;
        self
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue an access token
    ///
    /// # Errors
    ///
    /// See [`issue_token`].
    pub fn issue(
        &self,
        subject: &str,
        extra: Option<Map<String, Value>>,
    ) -> Result<String, IssueError> {
        self.issue_with_ttl(subject, self.access_ttl, extra)
    }

    /// Issue a long-lived refresh token
    ///
    /// # Errors
    ///
    /// See [`issue_token`].
    pub fn issue_refresh(&self, subject: &str) -> Result<String, IssueError> {
        self.issue_with_ttl(subject, self.refresh_ttl, None)
    }

    /// Issue a token with an explicit lifetime
    ///
    /// # Errors
    ///
    /// See [`issue_token`].
    pub fn issue_with_ttl(
        &self,
        subject: &str,
        ttl: Duration,
        extra: Option<Map<String, Value>>,
    ) -> Result<String, IssueError> {
        issue_token(subject, ttl, &self.secret, extra)
    }

    /// # Errors
    ///
    /// See [`validate_token`].
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        validate_token(token, &self.secret)
    }
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}
