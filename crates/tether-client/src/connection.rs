//! Connection lifecycle: initialize, discovery, keepalive, reconnect.

use crate::config::{Config, SessionOnReconnect};
use crate::registry::{CapabilityRegistry, ToolCapability};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tether_rpc::{HttpTransport, RpcError};
use tether_types::{ConnectError, PromptDescriptor, ResourceDescriptor, ToolDescriptor};
use tokio_util::sync::CancellationToken;

/// Protocol version advertised during the handshake.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client identity advertised during the handshake.
const CLIENT_NAME: &str = "tether";

/// Connection lifecycle status. Mutated only by [`Connection`]; externally
/// read-only through [`Connection::snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Discovering,
    /// Waiting for an operator-driven auth exchange in front of the
    /// endpoint; not entered by the core sequence itself.
    PendingAuth,
    Authenticating,
    Connecting,
    Loading,
    Ready,
    Failed,
}

impl ConnectionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Discovering => "discovering",
            ConnectionStatus::PendingAuth => "pending_auth",
            ConnectionStatus::Authenticating => "authenticating",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Loading => "loading",
            ConnectionStatus::Ready => "ready",
            ConnectionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the connection, for state and health reporting.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSnapshot {
    pub status: ConnectionStatus,
    pub last_error: Option<String>,
    pub last_connected: Option<DateTime<Utc>>,
    pub reconnect_attempts: u32,
    pub tools: Vec<String>,
    pub resources: Vec<String>,
    pub prompts: Vec<String>,
    pub capabilities: Vec<ToolCapability>,
}

#[derive(Debug)]
struct StateInner {
    status: ConnectionStatus,
    last_error: Option<String>,
    last_connected: Option<DateTime<Utc>>,
    reconnect_attempts: u32,
}

#[derive(Default)]
struct Discovered {
    tools: Vec<ToolDescriptor>,
    resources: Vec<ResourceDescriptor>,
    prompts: Vec<PromptDescriptor>,
    registry: CapabilityRegistry,
}

#[derive(serde::Deserialize)]
struct ToolsList {
    #[serde(default)]
    tools: Vec<ToolDescriptor>,
}

#[derive(serde::Deserialize)]
struct ResourcesList {
    #[serde(default)]
    resources: Vec<ResourceDescriptor>,
}

#[derive(serde::Deserialize)]
struct PromptsList {
    #[serde(default)]
    prompts: Vec<PromptDescriptor>,
}

/// Owns the connection state machine.
///
/// `discovering → connecting → loading → ready`; any step failing moves to
/// `failed` with the triggering error recorded and all pending requests
/// rejected. Initialization failure is fatal to that attempt, never to the
/// process. State transitions are strictly sequential: a single in-flight
/// guard ensures no two initialize/reconnect sequences overlap.
pub struct Connection {
    transport: Arc<HttpTransport>,
    state: Mutex<StateInner>,
    discovered: Mutex<Discovered>,
    /// Serializes initialize/reconnect sequences.
    op_guard: tokio::sync::Mutex<()>,
    keepalive_cancel: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
    keepalive_interval: Duration,
    session_on_reconnect: SessionOnReconnect,
}

impl Connection {
    pub fn new(transport: Arc<HttpTransport>, config: &Config) -> Self {
        Self {
            transport,
            state: Mutex::new(StateInner {
                status: ConnectionStatus::Discovering,
                last_error: None,
                last_connected: None,
                reconnect_attempts: 0,
            }),
            discovered: Mutex::new(Discovered::default()),
            op_guard: tokio::sync::Mutex::new(()),
            keepalive_cancel: Mutex::new(None),
            shutdown: CancellationToken::new(),
            keepalive_interval: config.keepalive_interval,
            session_on_reconnect: config.session_on_reconnect,
        }
    }

    pub fn transport(&self) -> &Arc<HttpTransport> {
        &self.transport
    }

    pub fn status(&self) -> ConnectionStatus {
        self.state.lock().expect("state lock poisoned").status
    }

    pub fn last_connected(&self) -> Option<DateTime<Utc>> {
        self.state.lock().expect("state lock poisoned").last_connected
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().expect("state lock poisoned").last_error.clone()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.state.lock().expect("state lock poisoned").reconnect_attempts
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.discovered
            .lock()
            .expect("discovered lock poisoned")
            .registry
            .contains(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.discovered
            .lock()
            .expect("discovered lock poisoned")
            .registry
            .names()
    }

    /// (tools, resources, prompts) counts.
    pub fn capability_counts(&self) -> (usize, usize, usize) {
        let discovered = self.discovered.lock().expect("discovered lock poisoned");
        (
            discovered.tools.len(),
            discovered.resources.len(),
            discovered.prompts.len(),
        )
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.state.lock().expect("state lock poisoned");
        let discovered = self.discovered.lock().expect("discovered lock poisoned");
        ConnectionSnapshot {
            status: state.status,
            last_error: state.last_error.clone(),
            last_connected: state.last_connected,
            reconnect_attempts: state.reconnect_attempts,
            tools: discovered.tools.iter().map(|t| t.name.clone()).collect(),
            resources: discovered.resources.iter().map(|r| r.uri.clone()).collect(),
            prompts: discovered.prompts.iter().map(|p| p.name.clone()).collect(),
            capabilities: discovered.registry.summary(),
        }
    }

    /// Run the full initialize sequence: handshake, initialized
    /// notification, concurrent capability discovery, classification,
    /// then `ready` with the keepalive timer running.
    ///
    /// Calling again while `ready` is a no-op; re-establishing an
    /// existing connection goes through [`reconnect`](Connection::reconnect).
    pub async fn initialize(self: &Arc<Self>) -> Result<(), ConnectError> {
        let _guard = self.op_guard.lock().await;
        if self.status() == ConnectionStatus::Ready {
            tracing::debug!("Already connected; use reconnect to re-establish");
            return Ok(());
        }
        self.initialize_locked().await
    }

    async fn initialize_locked(self: &Arc<Self>) -> Result<(), ConnectError> {
        if self.shutdown.is_cancelled() {
            return Err(ConnectError::Cancelled);
        }

        self.set_status(ConnectionStatus::Connecting);

        if let Err(err) = self.handshake().await {
            let failure = ConnectError::Handshake {
                service: self.transport.service().to_string(),
                message: err.to_string(),
            };
            self.fail(&failure).await;
            return Err(failure);
        }

        // Fire-and-forget: a failed initialized notification is logged,
        // not fatal
        if let Err(err) = self.transport.notify("notifications/initialized", None).await {
            tracing::warn!("Failed to send initialized notification: {err}");
        }

        self.set_status(ConnectionStatus::Loading);

        // Each discovery category is independently allowed to fail;
        // partial capability sets are acceptable
        let (tools, resources, prompts) = tokio::join!(
            self.discover_tools(),
            self.discover_resources(),
            self.discover_prompts(),
        );
        let tools = self.unwrap_category("tools", tools);
        let resources = self.unwrap_category("resources", resources);
        let prompts = self.unwrap_category("prompts", prompts);

        let registry = CapabilityRegistry::from_tools(&tools);

        tracing::info!(
            service = %self.transport.service(),
            tools = tools.len(),
            resources = resources.len(),
            prompts = prompts.len(),
            "Connected and discovered capabilities"
        );

        {
            let mut discovered = self.discovered.lock().expect("discovered lock poisoned");
            *discovered = Discovered {
                tools,
                resources,
                prompts,
                registry,
            };
        }

        {
            let mut state = self.state.lock().expect("state lock poisoned");
            state.status = ConnectionStatus::Ready;
            state.last_connected = Some(Utc::now());
            state.last_error = None;
            state.reconnect_attempts = 0;
        }

        self.start_keepalive();
        Ok(())
    }

    /// Tear down and re-establish the connection.
    ///
    /// Outstanding requests are rejected exactly once, discovered
    /// capabilities are cleared, and the full initialize sequence runs
    /// again. The session identifier is preserved or refreshed per
    /// configuration; a handshake that issues a new one always wins.
    pub async fn reconnect(self: &Arc<Self>) -> Result<(), ConnectError> {
        let _guard = self.op_guard.lock().await;
        if self.shutdown.is_cancelled() {
            return Err(ConnectError::Cancelled);
        }

        let attempt = {
            let mut state = self.state.lock().expect("state lock poisoned");
            state.reconnect_attempts += 1;
            state.reconnect_attempts
        };
        tracing::info!(
            service = %self.transport.service(),
            attempt,
            "Reconnecting"
        );

        self.stop_keepalive();
        self.transport.reject_pending("reconnection in progress").await;

        {
            let mut discovered = self.discovered.lock().expect("discovered lock poisoned");
            *discovered = Discovered::default();
        }
        self.set_status(ConnectionStatus::Discovering);

        if self.session_on_reconnect == SessionOnReconnect::Refresh {
            self.transport.set_session(None).await;
        }

        self.initialize_locked().await
    }

    /// Stop the keepalive loop and reject anything still outstanding.
    pub async fn shutdown(&self) {
        tracing::info!(service = %self.transport.service(), "Shutting down connection");
        self.shutdown.cancel();
        self.stop_keepalive();
        self.transport.reject_pending("connection shut down").await;
    }

    async fn handshake(&self) -> Result<(), RpcError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = self.transport.request("initialize", Some(params)).await?;

        // The transport already captured a header-supplied session id;
        // fall back to one carried in the handshake result
        if self.transport.session_id().await.is_none() {
            if let Some(sid) = result.get("sessionId").and_then(|s| s.as_str()) {
                self.transport.set_session(Some(sid.to_string())).await;
            }
        }

        Ok(())
    }

    async fn discover_tools(&self) -> Result<Vec<ToolDescriptor>, RpcError> {
        let result = self.transport.request("tools/list", None).await?;
        let list: ToolsList = serde_json::from_value(result)?;
        Ok(list.tools)
    }

    async fn discover_resources(&self) -> Result<Vec<ResourceDescriptor>, RpcError> {
        let result = self.transport.request("resources/list", None).await?;
        let list: ResourcesList = serde_json::from_value(result)?;
        Ok(list.resources)
    }

    async fn discover_prompts(&self) -> Result<Vec<PromptDescriptor>, RpcError> {
        let result = self.transport.request("prompts/list", None).await?;
        let list: PromptsList = serde_json::from_value(result)?;
        Ok(list.prompts)
    }

    fn unwrap_category<T>(&self, category: &str, result: Result<Vec<T>, RpcError>) -> Vec<T> {
        match result {
            Ok(items) => items,
            Err(err) => {
                tracing::warn!(
                    service = %self.transport.service(),
                    category,
                    "Discovery failed, continuing with a reduced capability set: {err}"
                );
                Vec::new()
            }
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        let mut state = self.state.lock().expect("state lock poisoned");
        tracing::debug!("Connection status: {} -> {}", state.status, status);
        state.status = status;
    }

    async fn fail(&self, err: &ConnectError) {
        {
            let mut state = self.state.lock().expect("state lock poisoned");
            state.status = ConnectionStatus::Failed;
            state.last_error = Some(err.to_string());
        }
        // Nothing may dangle past a failed attempt
        self.transport.reject_pending("initialization failed").await;
    }

    /// Start the keepalive loop, replacing any previous one.
    ///
    /// Every interval a lightweight idempotent call goes through the same
    /// transport; on failure, one reconnect is attempted — but only while
    /// `ready`, so an intentional teardown never triggers a reconnect storm.
    fn start_keepalive(self: &Arc<Self>) {
        let token = self.shutdown.child_token();
        {
            let mut slot = self.keepalive_cancel.lock().expect("keepalive lock poisoned");
            if let Some(previous) = slot.replace(token.clone()) {
                previous.cancel();
            }
        }

        let weak = Arc::downgrade(self);
        let interval = self.keepalive_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let Some(conn) = weak.upgrade() else { break };

                match conn.transport.request("tools/list", None).await {
                    Ok(_) => tracing::debug!("Keepalive ok"),
                    Err(err) => {
                        tracing::warn!(
                            service = %conn.transport.service(),
                            "Keepalive failed: {err}"
                        );
                        if conn.status() == ConnectionStatus::Ready && !token.is_cancelled() {
                            if let Err(err) = conn.reconnect().await {
                                tracing::error!(
                                    service = %conn.transport.service(),
                                    "Reconnect after keepalive failure did not succeed: {err}"
                                );
                            }
                        }
                    }
                }
            }
        });
    }

    fn stop_keepalive(&self) {
        let token = self
            .keepalive_cancel
            .lock()
            .expect("keepalive lock poisoned")
            .take();
        if let Some(token) = token {
            token.cancel();
        }
    }
}
