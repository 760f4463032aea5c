//! Transport-error classification.
//!
//! Turns a raw [`RpcError`] into a [`ServiceError`] with a retryable kind.
//! Rules are evaluated in priority order: connection-level failures first,
//! then status-coded failures, then explicit timeouts, and finally the
//! catch-all Unknown kind, which retries by default.

use tether_rpc::RpcError;
use tether_types::{ErrorKind, ServiceError};

/// Classify a raw transport failure for `service`, with an optional
/// free-text context appended to the resulting message.
pub fn classify(err: RpcError, service: &str, context: Option<&str>) -> ServiceError {
    let detail = err.to_string();
    let (kind, status) = match &err {
        RpcError::Network(_) | RpcError::ChannelClosed => (ErrorKind::Network, None),
        RpcError::Http { status, .. } => (kind_for_status(*status), Some(*status)),
        RpcError::Timeout => (ErrorKind::Timeout, None),
        RpcError::Rpc { code, message } => (kind_for_rpc(*code, message), None),
        RpcError::Protocol(_) | RpcError::Cancelled(_) | RpcError::Json(_) => {
            (ErrorKind::Unknown, None)
        }
    };

    let mut classified = ServiceError::new(kind, service, detail, context).with_source(err);
    if let Some(status) = status {
        classified = classified.with_status(status);
    }
    classified
}

fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        429 => ErrorKind::RateLimit,
        401 | 403 => ErrorKind::Auth,
        400 => ErrorKind::Validation,
        502 | 503 | 504 => ErrorKind::Unavailable,
        408 => ErrorKind::Timeout,
        _ => ErrorKind::Unknown,
    }
}

/// JSON-RPC error objects carry no HTTP status; fall back to the code and
/// the message text.
fn kind_for_rpc(code: i64, message: &str) -> ErrorKind {
    let lowered = message.to_lowercase();
    if code == 429 || lowered.contains("rate limit") {
        ErrorKind::RateLimit
    } else if lowered.contains("unauthorized")
        || lowered.contains("forbidden")
        || lowered.contains("invalid credentials")
        || lowered.contains("invalid api key")
    {
        ErrorKind::Auth
    } else if code == -32600 || code == -32602 || lowered.contains("invalid request") {
        ErrorKind::Validation
    } else if lowered.contains("timeout") || lowered.contains("timed out") {
        ErrorKind::Timeout
    } else {
        ErrorKind::Unknown
    }
}
