//! JSON-RPC 2.0 over HTTP POST with SSE-framed responses.
//!
//! This is not a true persistent stream: each request gets its own HTTP
//! response, whose body may itself be SSE-framed and carry several discrete
//! JSON-RPC messages. The transport runs one parse pass per response body,
//! dispatches every message it finds to the correlator, and awaits its own
//! pending entry. There is no per-request timeout by design; connection
//! teardown is the only cancellation path.

pub mod correlator;
pub mod error;
pub mod jsonrpc;
pub mod sse;
pub mod transport;

pub use correlator::Correlator;
pub use error::RpcError;
pub use jsonrpc::{RpcErrorObject, RpcMessage, RpcNotification, RpcRequest, RpcResponse};
pub use sse::{SseEvent, SseParser};
pub use transport::HttpTransport;
