//! The `ToolClient` facade — the only surface consumed by callers.

use crate::config::{BreakerPolicy, Config};
use crate::connection::{Connection, ConnectionSnapshot, ConnectionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tether_resilience::{BreakerSnapshot, CircuitBreaker, RateLimiter, RetryConfig, classify, retry};
use tether_rpc::HttpTransport;
use tether_types::{
    CallResult, ClientError, ConnectError, ErrorKind, PromptResult, ResourceContents, ServiceError,
};

/// Full state snapshot: connection plus circuit breaker.
#[derive(Debug, Clone, Serialize)]
pub struct ClientState {
    #[serde(flatten)]
    pub connection: ConnectionSnapshot,
    pub breaker: BreakerSnapshot,
}

/// Health summary for external health-check endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    /// Whether the connection is currently `ready`.
    pub connected: bool,
    /// Whether a handshake has ever completed.
    pub initialized: bool,
    pub status: ConnectionStatus,
    pub tool_count: usize,
    pub resource_count: usize,
    pub prompt_count: usize,
    pub reconnect_attempts: u32,
    pub last_connected: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub breaker: BreakerSnapshot,
}

/// Client for one remote tool-execution server.
///
/// Every call is wrapped as `breaker.execute(retry(rate-limited send))`;
/// callers always receive classified errors, never raw transport failures.
pub struct ToolClient {
    connection: Arc<Connection>,
    breaker: CircuitBreaker,
    limiter: RateLimiter,
    retry_config: RetryConfig,
    service: String,
}

impl ToolClient {
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let service = config.service.clone();
        let transport = HttpTransport::new(&config.endpoint, &service)
            .map_err(|e| ClientError::Service(classify(e, &service, Some("client construction"))))?;
        let transport = Arc::new(transport);

        let breaker = match &config.breaker {
            BreakerPolicy::Tripping(breaker_config) => {
                CircuitBreaker::new(&service, breaker_config.clone())
            }
            BreakerPolicy::Permanent => CircuitBreaker::permanent(&service),
        };

        Ok(Self {
            connection: Arc::new(Connection::new(transport, &config)),
            breaker,
            limiter: RateLimiter::new(config.min_request_interval),
            retry_config: config.retry.clone(),
            service,
        })
    }

    /// Run the full connect sequence. Call again only via [`reconnect`].
    ///
    /// [`reconnect`]: ToolClient::reconnect
    pub async fn initialize(&self) -> Result<(), ClientError> {
        self.connection.initialize().await.map_err(ClientError::from)
    }

    /// Invoke a discovered tool with opaque parameters.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<CallResult, ClientError> {
        self.ensure_ready()?;
        if !self.connection.has_tool(name) {
            return Err(ConnectError::UnknownTool {
                name: name.to_string(),
                available: self.connection.tool_names(),
            }
            .into());
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let context = format!("tools/call {name}");
        let value = self.guarded_request("tools/call", params, &context).await?;

        serde_json::from_value(value)
            .map_err(|e| self.unparseable(&context, e))
            .map_err(ClientError::from)
    }

    /// Read a resource by URI.
    pub async fn read_resource(&self, uri: &str) -> Result<ResourceContents, ClientError> {
        self.ensure_ready()?;

        let params = serde_json::json!({ "uri": uri });
        let context = format!("resources/read {uri}");
        let value = self.guarded_request("resources/read", params, &context).await?;

        serde_json::from_value(value)
            .map_err(|e| self.unparseable(&context, e))
            .map_err(ClientError::from)
    }

    /// Fetch a prompt rendered with the given arguments.
    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<PromptResult, ClientError> {
        self.ensure_ready()?;

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });
        let context = format!("prompts/get {name}");
        let value = self.guarded_request("prompts/get", params, &context).await?;

        serde_json::from_value(value)
            .map_err(|e| self.unparseable(&context, e))
            .map_err(ClientError::from)
    }

    /// Read-only snapshot of connection state, discovered capabilities and
    /// breaker bookkeeping.
    pub fn connection_state(&self) -> ClientState {
        ClientState {
            connection: self.connection.snapshot(),
            breaker: self.breaker.snapshot(),
        }
    }

    /// Health summary for external health-check endpoints.
    pub fn health(&self) -> HealthStatus {
        let status = self.connection.status();
        let (tool_count, resource_count, prompt_count) = self.connection.capability_counts();
        HealthStatus {
            connected: status == ConnectionStatus::Ready,
            initialized: self.connection.last_connected().is_some(),
            status,
            tool_count,
            resource_count,
            prompt_count,
            reconnect_attempts: self.connection.reconnect_attempts(),
            last_connected: self.connection.last_connected(),
            last_error: self.connection.last_error(),
            breaker: self.breaker.snapshot(),
        }
    }

    /// Manual recovery: tear down and re-run the connect sequence.
    pub async fn reconnect(&self) -> Result<(), ClientError> {
        self.connection.reconnect().await.map_err(ClientError::from)
    }

    /// Stop the keepalive loop and reject outstanding requests.
    pub async fn shutdown(&self) {
        self.connection.shutdown().await;
    }

    fn ensure_ready(&self) -> Result<(), ClientError> {
        let status = self.connection.status();
        if status != ConnectionStatus::Ready {
            return Err(ConnectError::NotReady {
                status: status.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// `breaker.execute(retry(rate-limited send))` with the configured
    /// tool-call policy.
    async fn guarded_request(
        &self,
        method: &'static str,
        params: serde_json::Value,
        context: &str,
    ) -> Result<serde_json::Value, ClientError> {
        let transport = Arc::clone(self.connection.transport());
        let limiter = &self.limiter;

        let value = self
            .breaker
            .execute(|| {
                retry(
                    move || {
                        let transport = Arc::clone(&transport);
                        let params = params.clone();
                        async move {
                            limiter.wait_for_next().await;
                            transport.request(method, Some(params)).await
                        }
                    },
                    &self.retry_config,
                    &self.service,
                    Some(context),
                )
            })
            .await?;

        Ok(value)
    }

    fn unparseable(&self, context: &str, err: serde_json::Error) -> ServiceError {
        ServiceError::new(
            ErrorKind::Unknown,
            &self.service,
            format!("unparseable result: {err}"),
            Some(context),
        )
    }
}
