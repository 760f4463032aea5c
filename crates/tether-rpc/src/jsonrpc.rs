//! JSON-RPC 2.0 envelope types.

use serde::{Deserialize, Serialize};

/// A JSON-RPC 2.0 request.
///
/// Ids are integers allocated monotonically by the correlator, so they are
/// unique among concurrently outstanding requests.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response. Exactly one of `result`/`error` is present.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    pub error: Option<RpcErrorObject>,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

/// A JSON-RPC 2.0 notification (no id, never awaited).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcNotification {
    #[serde(default = "jsonrpc_version")]
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

fn jsonrpc_version() -> String {
    "2.0".to_string()
}

impl RpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params,
        }
    }
}

/// A parsed incoming message: a response to correlate by id, or an
/// out-of-band notification dispatched by method name.
#[derive(Debug, Clone)]
pub enum RpcMessage {
    Response(RpcResponse),
    Notification(RpcNotification),
}

impl RpcMessage {
    /// Split an incoming value on the presence of an `id` field.
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let has_id = value.get("id").is_some_and(|id| !id.is_null());
        if has_id {
            Ok(RpcMessage::Response(serde_json::from_value(value)?))
        } else {
            Ok(RpcMessage::Notification(serde_json::from_value(value)?))
        }
    }
}
