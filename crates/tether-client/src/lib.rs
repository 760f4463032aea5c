//! Client for a remote tool-execution server.
//!
//! Maintains a long-lived connection over JSON-RPC-in-SSE-over-POST,
//! discovers callable capabilities at runtime, and survives transient
//! failures through retry, rate limiting and circuit breaking. The only
//! surface consumed by external callers is [`ToolClient`].
//!
//! There is no global instance: the composition root constructs one
//! `ToolClient` per backing service configuration and injects it, so tests
//! can instantiate isolated clients against local servers.

pub mod client;
pub mod config;
pub mod connection;
pub mod registry;

pub use client::{ClientState, HealthStatus, ToolClient};
pub use config::{BreakerPolicy, Config, SessionOnReconnect, SettingsFile};
pub use connection::{Connection, ConnectionSnapshot, ConnectionStatus};
pub use registry::{CapabilityKind, CapabilityRegistry, Priority, ToolCapability};
