//! Client configuration.
//!
//! Resolved with precedence: environment > settings file > defaults.
//! The endpoint is required — there is no production default to fall
//! back on.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tether_resilience::{BackoffConfig, BreakerConfig, RetryConfig};
use tether_types::ConfigError;

/// Environment variable naming the tool-server endpoint.
pub const ENDPOINT_ENV: &str = "TETHER_ENDPOINT";

/// Default keepalive interval.
pub const DEFAULT_KEEPALIVE_MS: u64 = 30_000;

/// Default minimum interval between outbound requests.
pub const DEFAULT_MIN_REQUEST_INTERVAL_MS: u64 = 100;

/// Whether the session identifier survives a reconnect.
///
/// The handshake always wins: a server that issues a fresh identifier
/// replaces whatever was preserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionOnReconnect {
    Preserve,
    #[default]
    Refresh,
}

/// Which circuit-breaker variant guards calls.
#[derive(Debug, Clone)]
pub enum BreakerPolicy {
    Tripping(BreakerConfig),
    /// Never abandon the connection; every attempt goes through.
    Permanent,
}

/// Resolved configuration for one client instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Tool-server endpoint URL.
    pub endpoint: String,
    /// Service label used in logs and error messages.
    pub service: String,
    pub keepalive_interval: Duration,
    pub min_request_interval: Duration,
    pub retry: RetryConfig,
    pub breaker: BreakerPolicy,
    pub session_on_reconnect: SessionOnReconnect,
}

impl Config {
    /// Configuration with defaults for everything but the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            service: "toolserver".to_string(),
            keepalive_interval: Duration::from_millis(DEFAULT_KEEPALIVE_MS),
            min_request_interval: Duration::from_millis(DEFAULT_MIN_REQUEST_INTERVAL_MS),
            retry: RetryConfig::default(),
            breaker: BreakerPolicy::Permanent,
            session_on_reconnect: SessionOnReconnect::default(),
        }
    }

    /// Load from an optional settings file, the environment, and an
    /// optional caller override. Precedence for the endpoint:
    /// override > environment > file.
    pub fn load(
        settings_path: Option<&Path>,
        endpoint_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let settings = match settings_path {
            Some(path) => load_settings_file(path)?,
            None => SettingsFile::default(),
        };
        let endpoint = endpoint_override.or_else(|| std::env::var(ENDPOINT_ENV).ok());
        resolve(settings, endpoint)
    }
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub endpoint: Option<String>,
    pub service: Option<String>,
    pub keepalive_interval_ms: Option<u64>,
    pub min_request_interval_ms: Option<u64>,
    pub session_on_reconnect: Option<SessionOnReconnect>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySettings {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub jitter_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BreakerSettings {
    /// "permanent" (default) or "tripping".
    pub policy: Option<String>,
    pub failure_threshold: Option<u32>,
    pub reset_timeout_ms: Option<u64>,
}

fn load_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Apply precedence: environment beats the settings file; defaults fill
/// the rest. Split out from `load` so tests never touch process state.
fn resolve(settings: SettingsFile, env_endpoint: Option<String>) -> Result<Config, ConfigError> {
    let endpoint = env_endpoint
        .or(settings.connection.endpoint)
        .ok_or_else(|| ConfigError::MissingKey {
            key: format!("endpoint (set {ENDPOINT_ENV} or add to the settings file)"),
        })?;

    let defaults = RetryConfig::default();
    let default_backoff = BackoffConfig::default();
    let retry = RetryConfig {
        max_retries: settings.retry.max_retries.unwrap_or(defaults.max_retries),
        backoff: BackoffConfig {
            base_delay_ms: settings
                .retry
                .base_delay_ms
                .unwrap_or(default_backoff.base_delay_ms),
            max_delay_ms: settings
                .retry
                .max_delay_ms
                .unwrap_or(default_backoff.max_delay_ms),
            multiplier: settings.retry.multiplier.unwrap_or(default_backoff.multiplier),
            jitter_ms: settings.retry.jitter_ms.unwrap_or(default_backoff.jitter_ms),
        },
    };

    let breaker = match settings.breaker.policy.as_deref() {
        None | Some("permanent") => BreakerPolicy::Permanent,
        Some("tripping") => {
            let defaults = BreakerConfig::default();
            BreakerPolicy::Tripping(BreakerConfig {
                failure_threshold: settings
                    .breaker
                    .failure_threshold
                    .unwrap_or(defaults.failure_threshold),
                reset_timeout: settings
                    .breaker
                    .reset_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.reset_timeout),
            })
        }
        Some(other) => {
            return Err(ConfigError::InvalidValue {
                key: "breaker.policy".to_string(),
                message: format!("expected 'permanent' or 'tripping', got '{other}'"),
            });
        }
    };

    Ok(Config {
        endpoint,
        service: settings
            .connection
            .service
            .unwrap_or_else(|| "toolserver".to_string()),
        keepalive_interval: Duration::from_millis(
            settings
                .connection
                .keepalive_interval_ms
                .unwrap_or(DEFAULT_KEEPALIVE_MS),
        ),
        min_request_interval: Duration::from_millis(
            settings
                .connection
                .min_request_interval_ms
                .unwrap_or(DEFAULT_MIN_REQUEST_INTERVAL_MS),
        ),
        retry,
        breaker,
        session_on_reconnect: settings.connection.session_on_reconnect.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_required() {
        let result = resolve(SettingsFile::default(), None);
        match result {
            Err(ConfigError::MissingKey { key }) => assert!(key.contains(ENDPOINT_ENV)),
            other => panic!("Expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn env_endpoint_beats_the_settings_file() {
        let settings: SettingsFile = toml::from_str(
            r#"
[connection]
endpoint = "https://file.example/rpc"
"#,
        )
        .unwrap();
        let config = resolve(settings, Some("https://env.example/rpc".to_string())).unwrap();
        assert_eq!(config.endpoint, "https://env.example/rpc");
    }

    #[test]
    fn file_endpoint_is_used_without_env() {
        let settings: SettingsFile = toml::from_str(
            r#"
[connection]
endpoint = "https://file.example/rpc"
service = "contentserver"
"#,
        )
        .unwrap();
        let config = resolve(settings, None).unwrap();
        assert_eq!(config.endpoint, "https://file.example/rpc");
        assert_eq!(config.service, "contentserver");
    }

    #[test]
    fn defaults_fill_unspecified_tunables() {
        let config = resolve(SettingsFile::default(), Some("http://x".to_string())).unwrap();
        assert_eq!(config.keepalive_interval, Duration::from_millis(30_000));
        assert_eq!(config.min_request_interval, Duration::from_millis(100));
        assert_eq!(config.retry.max_retries, 2);
        assert!(matches!(config.breaker, BreakerPolicy::Permanent));
        assert_eq!(config.session_on_reconnect, SessionOnReconnect::Refresh);
    }

    #[test]
    fn tripping_breaker_settings_parse() {
        let settings: SettingsFile = toml::from_str(
            r#"
[breaker]
policy = "tripping"
failure_threshold = 3
reset_timeout_ms = 5000
"#,
        )
        .unwrap();
        let config = resolve(settings, Some("http://x".to_string())).unwrap();
        match config.breaker {
            BreakerPolicy::Tripping(cfg) => {
                assert_eq!(cfg.failure_threshold, 3);
                assert_eq!(cfg.reset_timeout, Duration::from_millis(5000));
            }
            BreakerPolicy::Permanent => panic!("Expected tripping breaker"),
        }
    }

    #[test]
    fn unknown_breaker_policy_is_rejected() {
        let settings: SettingsFile = toml::from_str(
            r#"
[breaker]
policy = "sometimes"
"#,
        )
        .unwrap();
        let result = resolve(settings, Some("http://x".to_string()));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn retry_tunables_parse() {
        let settings: SettingsFile = toml::from_str(
            r#"
[retry]
max_retries = 5
base_delay_ms = 200
multiplier = 3.0
"#,
        )
        .unwrap();
        let config = resolve(settings, Some("http://x".to_string())).unwrap();
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.backoff.base_delay_ms, 200);
        assert!((config.retry.backoff.multiplier - 3.0).abs() < f64::EPSILON);
        // Unset values keep their defaults
        assert_eq!(config.retry.backoff.max_delay_ms, 30_000);
    }

    #[test]
    fn session_preserve_parses() {
        let settings: SettingsFile = toml::from_str(
            r#"
[connection]
endpoint = "http://x"
session_on_reconnect = "preserve"
"#,
        )
        .unwrap();
        let config = resolve(settings, None).unwrap();
        assert_eq!(config.session_on_reconnect, SessionOnReconnect::Preserve);
    }
}
