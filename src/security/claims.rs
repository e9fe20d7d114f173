use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Verified claims of an access token.
///
/// `sub`, `iat`, `exp` and `scopes` are lifted into typed fields; every other claim
/// is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claims {
    pub subject: String,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub scopes: Option<Vec<String>>,
    pub extra: Map<String, Value>,
}

impl Claims {
    /// Whether the token grants `scope`
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes
            .as_ref()
            .is_some_and(|scopes| scopes.iter().any(|s| s == scope))
    }

    /// Claim outside the standard set, e.g. `role`
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// String-valued extra claim
    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.extra.get(name).and_then(Value::as_str)
    }
}
