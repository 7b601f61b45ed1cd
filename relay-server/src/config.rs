//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup. A missing secret is a startup error,
//! never an empty value that every request would then be compared against.

use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;
use url::Url;

/// Realm advertised in `WWW-Authenticate` when none is configured.
pub const DEFAULT_BASIC_REALM: &str = "webhook-relay";

/// Errors that stop the process before it starts listening.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("unknown AUTH_MODE {0:?}, expected one of: token, api_key, basic")]
    UnknownAuthMode(String),

    #[error("invalid N8N_ENDPOINT {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

/// Expected credentials for the active auth mode.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthConfig {
    /// `X-Relay-Token` must equal `token`.
    SharedToken { token: String },
    /// `X-API-Key` must equal `key`.
    ApiKey { key: String },
    /// HTTP Basic credentials must equal `username` / `password`.
    Basic {
        username: String,
        password: String,
        realm: String,
    },
}

impl AuthConfig {
    /// Name of the mode as accepted by `AUTH_MODE`.
    pub fn mode_name(&self) -> &'static str {
        match self {
            AuthConfig::SharedToken { .. } => "token",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
        }
    }
}

// Secrets must never reach the logs through `{:?}`.
impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::SharedToken { .. } => f
                .debug_struct("SharedToken")
                .field("token", &"<redacted>")
                .finish(),
            AuthConfig::ApiKey { .. } => {
                f.debug_struct("ApiKey").field("key", &"<redacted>").finish()
            }
            AuthConfig::Basic { username, realm, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .field("realm", realm)
                .finish(),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential scheme and expected values
    pub auth: AuthConfig,

    /// Downstream n8n webhook URL every payload is posted to
    pub forward_url: Url,

    /// Upper bound for one outbound forward, connect through body read
    pub forward_timeout: Duration,

    /// Per-probe bound for the connectivity diagnostics
    pub probe_timeout: Duration,

    /// Whether `/test-connection` and `/debug-ip` sit behind the auth gate
    pub diagnostics_require_auth: bool,

    /// Port for the web server to listen on
    pub port: u16,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth = parse_auth(&lookup)?;
        let forward_url = parse_endpoint(&required(&lookup, "N8N_ENDPOINT")?)?;

        Ok(Config {
            auth,
            forward_url,
            forward_timeout: parse_secs(&lookup, "FORWARD_TIMEOUT_SECS", 10.0),
            probe_timeout: parse_secs(&lookup, "PROBE_TIMEOUT_SECS", 5.0),
            diagnostics_require_auth: parse_bool(&lookup, "DIAGNOSTICS_REQUIRE_AUTH", true),
            port: lookup("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),
        })
    }
}

fn parse_auth<F>(lookup: &F) -> Result<AuthConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mode = lookup("AUTH_MODE").unwrap_or_else(|| "token".to_string());

    match mode.trim().to_ascii_lowercase().as_str() {
        "token" => Ok(AuthConfig::SharedToken {
            token: required(lookup, "RELAY_TOKEN")?,
        }),
        "api_key" | "apikey" => Ok(AuthConfig::ApiKey {
            key: required(lookup, "RELAY_API_KEY")?,
        }),
        "basic" => Ok(AuthConfig::Basic {
            username: required(lookup, "BASIC_AUTH_USERNAME")?,
            password: required(lookup, "BASIC_AUTH_PASSWORD")?,
            realm: lookup("BASIC_AUTH_REALM")
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASIC_REALM.to_string()),
        }),
        _ => Err(ConfigError::UnknownAuthMode(mode)),
    }
}

/// Fetch a variable that must be present and non-blank. The value itself is
/// kept verbatim so comparisons stay exact.
fn required<F>(lookup: &F, name: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEndpoint {
        url: raw.to_string(),
        reason,
    };

    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme {}", url.scheme())));
    }
    if url.host().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(url)
}

/// Parse a positive number of (possibly fractional) seconds.
fn parse_secs<F>(lookup: &F, name: &str, default: f64) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Duration::from_secs_f64(default);
    };

    let parsed = raw
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| *secs > 0.0)
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

    match parsed {
        Some(duration) => duration,
        None => {
            warn!(env_var = name, value = %raw, "Invalid duration, using default");
            Duration::from_secs_f64(default)
        }
    }
}

fn parse_bool<F>(lookup: &F, name: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return default;
    };

    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => {
            warn!(env_var = name, value = %raw, "Invalid boolean, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_token_mode_is_default() {
        let config = load(&[
            ("RELAY_TOKEN", "s3cret"),
            ("N8N_ENDPOINT", "http://10.0.0.5:5678/webhook/zendesk"),
        ])
        .unwrap();

        assert_eq!(
            config.auth,
            AuthConfig::SharedToken {
                token: "s3cret".to_string()
            }
        );
        assert_eq!(config.forward_url.as_str(), "http://10.0.0.5:5678/webhook/zendesk");
        assert_eq!(config.forward_timeout, Duration::from_secs(10));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(config.diagnostics_require_auth);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn test_missing_token_is_fatal() {
        let err = load(&[("N8N_ENDPOINT", "http://n8n:5678/webhook")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("RELAY_TOKEN"));

        let err = load(&[
            ("RELAY_TOKEN", "   "),
            ("N8N_ENDPOINT", "http://n8n:5678/webhook"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("RELAY_TOKEN"));
    }

    #[test]
    fn test_api_key_mode_requires_key() {
        let err = load(&[
            ("AUTH_MODE", "api_key"),
            ("RELAY_TOKEN", "unused"),
            ("N8N_ENDPOINT", "http://n8n:5678/webhook"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("RELAY_API_KEY"));

        let config = load(&[
            ("AUTH_MODE", "API_KEY"),
            ("RELAY_API_KEY", "key-123"),
            ("N8N_ENDPOINT", "http://n8n:5678/webhook"),
        ])
        .unwrap();
        assert_eq!(config.auth.mode_name(), "api_key");
    }

    #[test]
    fn test_basic_mode() {
        let err = load(&[
            ("AUTH_MODE", "basic"),
            ("BASIC_AUTH_USERNAME", "zendesk"),
            ("N8N_ENDPOINT", "http://n8n:5678/webhook"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("BASIC_AUTH_PASSWORD"));

        let config = load(&[
            ("AUTH_MODE", "basic"),
            ("BASIC_AUTH_USERNAME", "zendesk"),
            ("BASIC_AUTH_PASSWORD", "hunter2"),
            ("N8N_ENDPOINT", "http://n8n:5678/webhook"),
        ])
        .unwrap();
        assert_eq!(
            config.auth,
            AuthConfig::Basic {
                username: "zendesk".to_string(),
                password: "hunter2".to_string(),
                realm: DEFAULT_BASIC_REALM.to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_auth_mode() {
        let err = load(&[
            ("AUTH_MODE", "oauth"),
            ("N8N_ENDPOINT", "http://n8n:5678/webhook"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::UnknownAuthMode("oauth".to_string()));
    }

    #[test]
    fn test_endpoint_validation() {
        let err = load(&[("RELAY_TOKEN", "t")]).unwrap_err();
        assert_eq!(err, ConfigError::Missing("N8N_ENDPOINT"));

        let err = load(&[("RELAY_TOKEN", "t"), ("N8N_ENDPOINT", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));

        let err = load(&[("RELAY_TOKEN", "t"), ("N8N_ENDPOINT", "ftp://n8n/webhook")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_optional_values() {
        let config = load(&[
            ("RELAY_TOKEN", "t"),
            ("N8N_ENDPOINT", "https://n8n.internal/webhook"),
            ("FORWARD_TIMEOUT_SECS", "2.5"),
            ("PROBE_TIMEOUT_SECS", "-1"),
            ("DIAGNOSTICS_REQUIRE_AUTH", "false"),
            ("PORT", "9000"),
        ])
        .unwrap();

        assert_eq!(config.forward_timeout, Duration::from_millis(2500));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(!config.diagnostics_require_auth);
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_unrepresentable_durations_fall_back() {
        for raw in ["1e20", "inf", "NaN", "0", "soon"] {
            let config = load(&[
                ("RELAY_TOKEN", "t"),
                ("N8N_ENDPOINT", "https://n8n.internal/webhook"),
                ("FORWARD_TIMEOUT_SECS", raw),
            ])
            .unwrap();
            assert_eq!(config.forward_timeout, Duration::from_secs(10), "{}", raw);
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = AuthConfig::Basic {
            username: "zendesk".to_string(),
            password: "hunter2".to_string(),
            realm: "relay".to_string(),
        };
        let debug = format!("{:?}", auth);
        assert!(debug.contains("zendesk"));
        assert!(!debug.contains("hunter2"));

        let token = AuthConfig::SharedToken {
            token: "s3cret".to_string(),
        };
        assert!(!format!("{:?}", token).contains("s3cret"));
    }
}
