//! Request/response correlation.
//!
//! Responses on the same connection are not guaranteed to arrive in send
//! order, so every outstanding request is matched strictly by id. Each
//! pending entry is resolved or rejected exactly once; teardown rejects
//! whatever is left so nothing dangles.

use crate::error::RpcError;
use crate::jsonrpc::RpcResponse;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, oneshot};

type Pending = oneshot::Sender<Result<serde_json::Value, RpcError>>;

/// Maps outstanding request ids to their pending completions.
pub struct Correlator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a fresh request id, unique among outstanding requests.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a pending request before it is sent.
    pub async fn register(&self, id: u64) -> oneshot::Receiver<Result<serde_json::Value, RpcError>> {
        let (tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().await;
        pending.insert(id, tx);
        rx
    }

    /// Resolve the pending request matching this response, with its result
    /// or an error built from the error object. Unknown ids are dropped
    /// with a warning.
    pub async fn resolve(&self, resp: RpcResponse) {
        let Some(id) = resp.id else {
            tracing::warn!("Response without id cannot be correlated");
            return;
        };

        let tx = {
            let mut pending = self.pending.lock().await;
            pending.remove(&id)
        };

        let Some(tx) = tx else {
            tracing::warn!(id, "Response for unknown request id");
            return;
        };

        let outcome = match resp.error {
            Some(err) => Err(RpcError::Rpc {
                code: err.code,
                message: err.message,
            }),
            None => Ok(resp.result.unwrap_or(serde_json::Value::Null)),
        };
        let _ = tx.send(outcome);
    }

    /// Reject one pending request, e.g. when its send failed.
    pub async fn fail(&self, id: u64, err: RpcError) {
        let tx = {
            let mut pending = self.pending.lock().await;
            pending.remove(&id)
        };
        if let Some(tx) = tx {
            let _ = tx.send(Err(err));
        }
    }

    /// Reject every pending request during connection teardown.
    pub async fn reject_all(&self, reason: impl Fn() -> RpcError) {
        let drained: Vec<(u64, Pending)> = {
            let mut pending = self.pending.lock().await;
            pending.drain().collect()
        };
        for (id, tx) in drained {
            tracing::debug!(id, "Rejecting pending request");
            let _ = tx.send(Err(reason()));
        }
    }

    /// Number of requests currently awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new()
    }
}
