//! # Configuration Module
//!
//! Application settings loaded from a YAML or TOML file, then overridden by
//! `RAMPART_*` environment variables.
//!
//! ## File format
//!
//! ```yaml
//! server:
//!   env: production
//! rate_limit:
//!   enabled: true
//!   requests: 100
//!   window_secs: 60
//! jwt:
//!   enabled: true
//!   secret: change-me
//!   access_ttl_secs: 900
//!   refresh_ttl_secs: 604800
//! security_headers:
//!   enabled: true
//!   csp: "default-src 'self';"
//! log:
//!   level: info
//!   format: json
//! ```
//!
//! Every section and field is optional; missing values take the defaults shown
//! by [`AppConfig::default`].
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `RAMPART_ENV` | `server.env` |
//! | `RAMPART_ENABLE_RATE_LIMIT` | `rate_limit.enabled` |
//! | `RAMPART_RATE_LIMIT_REQUESTS` | `rate_limit.requests` |
//! | `RAMPART_RATE_LIMIT_WINDOW_SECS` | `rate_limit.window_secs` |
//! | `RAMPART_ENABLE_JWT` | `jwt.enabled` |
//! | `RAMPART_JWT_SECRET` | `jwt.secret` |
//! | `RAMPART_JWT_ACCESS_TTL_SECS` | `jwt.access_ttl_secs` |
//! | `RAMPART_JWT_REFRESH_TTL_SECS` | `jwt.refresh_ttl_secs` |
//! | `RAMPART_ENABLE_SECURITY_HEADERS` | `security_headers.enabled` |
//! | `RAMPART_CSP` | `security_headers.csp` |
//! | `RAMPART_HSTS` | `security_headers.hsts` |
//! | `RAMPART_LOG_LEVEL` | `log.level` |
//! | `RAMPART_LOG_FORMAT` | `log.format` |
//! | `RAMPART_LOG_ASYNC` | `log.async_output` |
//!
//! Values that fail to parse are ignored with a warning.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::middleware::DEFAULT_CSP;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "RAMPART_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Deployment environment name, e.g. `development` or `production`
    pub env: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            env: "development".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests allowed per client within one window
    pub requests: usize,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests: 100,
            window_secs: 60,
        }
    }
}

impl RateLimitConfig {
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub enabled: bool,
    pub secret: String,
    pub access_ttl_secs: u64,
    pub refresh_ttl_secs: u64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            secret: String::new(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 7 * 24 * 60 * 60,
        }
    }
}

impl JwtConfig {
    #[must_use]
    pub fn access_ttl(&self) -> chrono::Duration {
        seconds(self.access_ttl_secs)
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> chrono::Duration {
        seconds(self.refresh_ttl_secs)
    }
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("enabled", &self.enabled)
            .field("secret", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish()
    }
}

fn seconds(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityHeadersConfig {
    pub enabled: bool,
    /// `Content-Security-Policy`; empty disables the header
    pub csp: String,
    /// `Strict-Transport-Security`; unset by default
    pub hsts: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            csp: DEFAULT_CSP.to_string(),
            hsts: None,
        }
    }
}

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Parse a format name, defaulting to JSON
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// trace/debug/info/warn/error; `RUST_LOG` takes precedence when set
    pub level: String,
    pub format: LogFormat,
    /// Write through a background thread (`tracing-appender`)
    pub async_output: bool,
    /// Extra comma separated filter directives, e.g. `rampart::router=debug`
    pub target_filter: Option<String>,
    /// Include file:line in events
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            async_output: false,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Debug level, pretty output, synchronous, with locations
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_output: false,
            target_filter: None,
            include_location: true,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub jwt: JwtConfig,
    pub security_headers: SecurityHeadersConfig,
    pub log: LogConfig,
}

/// Configuration rejected by [`AppConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Rate limiting is enabled with a zero-length window
    ZeroRateLimitWindow,
    /// Rate limiting is enabled with a limit of zero requests
    ZeroRateLimitRequests,
    /// JWT is enabled but no signing secret is configured
    MissingJwtSecret,
    /// JWT is enabled with a zero access token lifetime
    ZeroAccessTtl,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroRateLimitWindow => {
                write!(f, "configuration error: rate_limit.window_secs must be greater than 0")
            }
            ConfigError::ZeroRateLimitRequests => {
                write!(f, "configuration error: rate_limit.requests must be greater than 0")
            }
            ConfigError::MissingJwtSecret => {
                write!(
                    f,
                    "configuration error: jwt.secret must be set when jwt.enabled is true"
                )
            }
            ConfigError::ZeroAccessTtl => {
                write!(f, "configuration error: jwt.access_ttl_secs must be greater than 0")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl AppConfig {
    /// Load from a `.yaml`/`.yml` or `.toml` file. Environment overrides are not applied.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, has an unknown extension, or does not parse.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let config = match ext.as_deref() {
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?,
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?,
            _ => bail!(
                "Unsupported config format: {} (expected .yaml, .yml or .toml)",
                path.display()
            ),
        };
        Ok(config)
    }

    /// Defaults overridden by the process environment
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Apply `RAMPART_*` overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, called with full variable names
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.is_empty())
        };

        if let Some(v) = get("ENV") {
            self.server.env = v;
        }

        override_parsed(&get, "ENABLE_RATE_LIMIT", &mut self.rate_limit.enabled);
        override_parsed(&get, "RATE_LIMIT_REQUESTS", &mut self.rate_limit.requests);
        override_parsed(&get, "RATE_LIMIT_WINDOW_SECS", &mut self.rate_limit.window_secs);

        override_parsed(&get, "ENABLE_JWT", &mut self.jwt.enabled);
        if let Some(v) = get("JWT_SECRET") {
            self.jwt.secret = v;
        }
        override_parsed(&get, "JWT_ACCESS_TTL_SECS", &mut self.jwt.access_ttl_secs);
        override_parsed(&get, "JWT_REFRESH_TTL_SECS", &mut self.jwt.refresh_ttl_secs);

        override_parsed(
            &get,
            "ENABLE_SECURITY_HEADERS",
            &mut self.security_headers.enabled,
        );
        if let Some(v) = get("CSP") {
            self.security_headers.csp = v;
        }
        if let Some(v) = get("HSTS") {
            self.security_headers.hsts = Some(v);
        }

        if let Some(v) = get("LOG_LEVEL") {
            self.log.level = v.to_lowercase();
        }
        if let Some(v) = get("LOG_FORMAT") {
            self.log.format = LogFormat::parse(&v);
        }
        override_parsed(&get, "LOG_ASYNC", &mut self.log.async_output);
    }

    /// Check the settings that would make enabled features unusable.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.enabled {
            if self.rate_limit.window_secs == 0 {
                return Err(ConfigError::ZeroRateLimitWindow);
            }
            if self.rate_limit.requests == 0 {
                return Err(ConfigError::ZeroRateLimitRequests);
            }
        }
        if self.jwt.enabled {
            if self.jwt.secret.is_empty() {
                return Err(ConfigError::MissingJwtSecret);
            }
            if self.jwt.access_ttl_secs == 0 {
                return Err(ConfigError::ZeroAccessTtl);
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        self.server.env.eq_ignore_ascii_case("development")
    }
}

fn override_parsed<T: FromStr>(get: &impl Fn(&str) -> Option<String>, name: &str, field: &mut T) {
    let Some(raw) = get(name) else {
        return;
    };
    match raw.parse() {
        Ok(v) => *field = v,
        Err(_) => warn!(
            variable = %format!("{ENV_PREFIX}{name}"),
            value = %raw,
            "Ignoring unparsable environment override"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn write_config(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.env, "development");
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests, 100);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(60));
        assert_eq!(config.jwt.access_ttl(), chrono::Duration::minutes(15));
        assert_eq!(config.jwt.refresh_ttl(), chrono::Duration::days(7));
        assert!(config.security_headers.enabled);
        assert_eq!(config.security_headers.csp, "default-src 'self';");
        assert_eq!(config.log.format, LogFormat::Json);
        assert!(config.is_development());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_yaml_with_partial_sections() {
        let file = write_config(
            ".yaml",
            "rate_limit:\n  enabled: true\n  requests: 5\njwt:\n  enabled: true\n  secret: abc\nlog:\n  format: pretty\n",
        );
        let config = AppConfig::load(file.path()).unwrap();
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests, 5);
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.jwt.secret, "abc");
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_toml() {
        let file = write_config(
            ".toml",
            "[server]\nenv = \"production\"\n\n[security_headers]\nhsts = \"max-age=60\"\n",
        );
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.server.env, "production");
        assert_eq!(config.security_headers.hsts.as_deref(), Some("max-age=60"));
        assert!(!config.is_development());
    }

    #[test]
    fn test_load_rejects_unknown_extension_and_bad_content() {
        let file = write_config(".ini", "x=1");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Unsupported config format"));

        let file = write_config(".yaml", "rate_limit: [not, a, map]");
        assert!(AppConfig::load(file.path()).is_err());

        assert!(AppConfig::load("/definitely/not/here.yaml").is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("RAMPART_ENV", "production"),
            ("RAMPART_ENABLE_RATE_LIMIT", "true"),
            ("RAMPART_RATE_LIMIT_REQUESTS", "7"),
            ("RAMPART_RATE_LIMIT_WINDOW_SECS", "not-a-number"),
            ("RAMPART_JWT_SECRET", "from-env"),
            ("RAMPART_LOG_LEVEL", "DEBUG"),
            ("RAMPART_LOG_FORMAT", "pretty"),
            ("RAMPART_CSP", ""),
        ]);
        let mut config = AppConfig::default();
        config.apply_env_from(|k| vars.get(k).map(|v| (*v).to_string()));

        assert_eq!(config.server.env, "production");
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.requests, 7);
        // Unparsable values leave the previous setting
        assert_eq!(config.rate_limit.window_secs, 60);
        assert_eq!(config.jwt.secret, "from-env");
        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Pretty);
        // Empty values are treated as unset
        assert_eq!(config.security_headers.csp, DEFAULT_CSP);
    }

    #[test]
    fn test_validate() {
        let mut config = AppConfig::default();
        config.rate_limit.enabled = true;
        config.rate_limit.window_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroRateLimitWindow));

        config.rate_limit.window_secs = 1;
        config.rate_limit.requests = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroRateLimitRequests));

        config.rate_limit.requests = 1;
        config.jwt.enabled = true;
        assert_eq!(config.validate(), Err(ConfigError::MissingJwtSecret));

        config.jwt.secret = "s".to_string();
        config.jwt.access_ttl_secs = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroAccessTtl));
    }

    #[test]
    fn test_jwt_secret_is_redacted_in_debug() {
        let mut config = AppConfig::default();
        config.jwt.secret = "hunter2".to_string();
        assert!(!format!("{config:?}").contains("hunter2"));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("invalid"), LogFormat::Json);
    }
}
