//! Error hierarchy for tether.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a service failure.
///
/// Every failure surfaced to callers carries exactly one kind; the kind
/// decides whether the operation is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    RateLimit,
    Auth,
    Validation,
    Unavailable,
    Timeout,
    Unknown,
}

impl ErrorKind {
    /// Whether an error of this kind is worth retrying.
    ///
    /// Unknown errors retry by default: most transient issues are
    /// unknown-shaped, so we fail open toward retrying.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Auth | ErrorKind::Validation)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Network => "network_error",
            ErrorKind::RateLimit => "rate_limit_error",
            ErrorKind::Auth => "authentication_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Unavailable => "service_unavailable",
            ErrorKind::Timeout => "timeout_error",
            ErrorKind::Unknown => "unknown_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified failure from a named external service.
///
/// The message always names the service; a free-text context string, when
/// supplied at classification time, is appended in parentheses.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub service: String,
    pub message: String,
    /// HTTP status, when the failure originated from a status code.
    pub status: Option<u16>,
    /// The raw error this classification was derived from.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServiceError {
    /// Build a classified error for `service`, with an optional context
    /// string appended to the message.
    pub fn new(
        kind: ErrorKind,
        service: impl Into<String>,
        detail: impl Into<String>,
        context: Option<&str>,
    ) -> Self {
        let service = service.into();
        let detail = detail.into();
        let message = match context {
            Some(ctx) => format!("[{service}] {kind}: {detail} ({ctx})"),
            None => format!("[{service}] {kind}: {detail}"),
        };
        Self {
            kind,
            service,
            message,
            status: None,
            source: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

/// Connection-lifecycle failures.
///
/// Distinct from [`ServiceError`]: these describe what went wrong while
/// establishing or maintaining the connection, not a failed call through it.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("handshake with '{service}' failed: {message}")]
    Handshake { service: String, message: String },

    #[error("discovery of {category} from '{service}' failed: {message}")]
    Discovery {
        service: String,
        category: String,
        message: String,
    },

    #[error("keepalive ping to '{service}' failed: {message}")]
    Keepalive { service: String, message: String },

    #[error("client is not ready (status: {status})")]
    NotReady { status: String },

    #[error("tool '{name}' not found, available: [{}]", available.join(", "))]
    UnknownTool {
        name: String,
        available: Vec<String>,
    },

    #[error("connection is shutting down")]
    Cancelled,
}

/// Top-level error returned by the client facade.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
