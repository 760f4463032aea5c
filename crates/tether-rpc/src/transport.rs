//! HTTP POST transport with SSE-framed response parsing.

use crate::correlator::Correlator;
use crate::error::RpcError;
use crate::jsonrpc::{RpcMessage, RpcNotification, RpcRequest};
use crate::sse::SseParser;
use tokio::sync::Mutex;

/// Header carrying the opaque session identifier.
const SESSION_HEADER: &str = "mcp-session-id";

/// Notification method that rotates the session identifier mid-connection.
const SESSION_NOTIFICATION: &str = "notifications/session";

/// JSON-RPC transport over HTTP POST.
///
/// Each request is its own POST; the response body may be plain JSON or
/// SSE-framed and may carry several discrete messages, all of which are
/// dispatched to the correlator before the caller's own pending entry
/// settles. The caller awaits the pending entry, not the HTTP exchange:
/// a response correlated out of another exchange's body completes the
/// call, and teardown can cancel it while the POST is still in flight.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: String,
    service: String,
    session: Mutex<Option<String>>,
    correlator: Correlator,
}

impl HttpTransport {
    /// Create a transport for `endpoint`.
    ///
    /// The client is built without a total-request deadline: the transport
    /// waits indefinitely and relies on retries and the circuit breaker,
    /// so callers wanting a deadline must wrap calls externally.
    pub fn new(endpoint: impl Into<String>, service: impl Into<String>) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::Network(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            service: service.into(),
            session: Mutex::new(None),
            correlator: Correlator::new(),
        })
    }

    /// The service name this transport talks to, for error labelling.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Current session identifier, if a handshake has produced one.
    pub async fn session_id(&self) -> Option<String> {
        self.session.lock().await.clone()
    }

    /// Replace (or clear) the session identifier.
    pub async fn set_session(&self, id: Option<String>) {
        *self.session.lock().await = id;
    }

    /// Number of requests currently awaiting a response.
    pub async fn pending_count(&self) -> usize {
        self.correlator.pending_count().await
    }

    /// Reject every pending request, e.g. during reconnect or shutdown.
    pub async fn reject_pending(&self, reason: &str) {
        let reason = reason.to_string();
        self.correlator
            .reject_all(|| RpcError::Cancelled(reason.clone()))
            .await;
    }

    /// Send a request and await the matching response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        let id = self.correlator.next_id();
        let mut rx = self.correlator.register(id).await;
        let envelope = RpcRequest::new(id, method, params);

        tracing::debug!(id, method, "POST {}", self.endpoint);

        let drive = self.drive(id, &envelope);
        tokio::pin!(drive);

        // The pending entry is authoritative: teardown may reject it, or a
        // different exchange's body may resolve it, while our POST is still
        // in flight. Dropping the drive future aborts the HTTP request.
        tokio::select! {
            outcome = &mut rx => {
                return outcome.unwrap_or(Err(RpcError::ChannelClosed));
            }
            _ = &mut drive => {}
        }

        rx.await.unwrap_or(Err(RpcError::ChannelClosed))
    }

    /// Send a fire-and-forget notification.
    pub async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), RpcError> {
        let envelope = RpcNotification::new(method, params);
        tracing::debug!(method, "POST {} (notification)", self.endpoint);

        let response = self.post(&serde_json::to_vec(&envelope)?).await?;
        let status = response.status();
        // 202 Accepted is the usual answer to a notification
        if status.is_success() {
            return Ok(());
        }
        Err(RpcError::Http {
            status: status.as_u16(),
            message: response.text().await.unwrap_or_default(),
        })
    }

    /// Perform the HTTP exchange for one request. All outcomes — transport
    /// failures included — are delivered through the correlator so the
    /// pending entry is never left dangling by a failed send.
    async fn drive(&self, id: u64, envelope: &RpcRequest) {
        let payload = match serde_json::to_vec(envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.correlator.fail(id, RpcError::Json(e)).await;
                return;
            }
        };

        let response = match self.post(&payload).await {
            Ok(resp) => resp,
            Err(err) => {
                self.correlator.fail(id, err).await;
                return;
            }
        };

        let status = response.status();
        let header_session = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        if !status.is_success() || status.as_u16() == 202 {
            let message = response.text().await.unwrap_or_default();
            self.correlator
                .fail(
                    id,
                    RpcError::Http {
                        status: status.as_u16(),
                        message,
                    },
                )
                .await;
            return;
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                self.correlator.fail(id, RpcError::from_reqwest(e)).await;
                return;
            }
        };

        self.dispatch_body(&content_type, &body).await;

        // A header-supplied session id takes precedence over any
        // notification seen in the same body
        if let Some(sid) = header_session {
            self.set_session(Some(sid)).await;
        }
    }

    async fn post(&self, body: &[u8]) -> Result<reqwest::Response, RpcError> {
        let mut req = self
            .http
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json, text/event-stream")
            .body(body.to_vec());

        if let Some(sid) = self.session_id().await {
            req = req.header(SESSION_HEADER, sid);
        }

        req.send().await.map_err(RpcError::from_reqwest)
    }

    /// One parse pass over a response body, dispatching every message found.
    async fn dispatch_body(&self, content_type: &str, body: &str) {
        if content_type.starts_with("text/event-stream") {
            let mut parser = SseParser::new();
            let mut events = parser.feed(&body.replace("\r\n", "\n"));
            if let Some(trailing) = parser.finish() {
                events.push(trailing);
            }
            for event in events {
                match serde_json::from_str(&event.data) {
                    Ok(value) => self.dispatch_message(value).await,
                    Err(e) => {
                        tracing::warn!("Unparseable SSE payload: {e}: {}", event.data);
                    }
                }
            }
        } else {
            match serde_json::from_str(body) {
                Ok(value) => self.dispatch_message(value).await,
                Err(e) => tracing::warn!("Unparseable response body: {e}"),
            }
        }
    }

    async fn dispatch_message(&self, value: serde_json::Value) {
        match RpcMessage::from_value(value) {
            Ok(RpcMessage::Response(resp)) => self.correlator.resolve(resp).await,
            Ok(RpcMessage::Notification(notif)) => self.handle_notification(notif).await,
            Err(e) => tracing::warn!("Malformed JSON-RPC message: {e}"),
        }
    }

    /// Out-of-band notifications never consult the pending map.
    async fn handle_notification(&self, notif: RpcNotification) {
        if notif.method == SESSION_NOTIFICATION {
            let renewed = notif
                .params
                .as_ref()
                .and_then(|p| p.get("sessionId"))
                .and_then(|s| s.as_str())
                .map(|s| s.to_string());
            if let Some(sid) = renewed {
                tracing::info!("Session identifier renewed by server");
                self.set_session(Some(sid)).await;
                return;
            }
        }
        tracing::debug!(method = %notif.method, "Unhandled notification");
    }
}
