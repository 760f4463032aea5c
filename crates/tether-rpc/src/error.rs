//! Transport-level error type.
//!
//! These are the raw, pre-classification failures. The resilience layer
//! turns them into classified `ServiceError` values before callers ever
//! see them.

use thiserror::Error;

/// Errors from the JSON-RPC transport.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("JSON-RPC error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Response channel dropped")]
    ChannelClosed,

    #[error("Request cancelled: {0}")]
    Cancelled(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RpcError {
    /// Map a reqwest failure onto the transport taxonomy.
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RpcError::Timeout
        } else {
            RpcError::Network(err.to_string())
        }
    }
}
