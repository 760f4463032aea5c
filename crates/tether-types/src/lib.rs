//! Shared types and error hierarchy for tether.
//!
//! Everything the other crates agree on lives here: the classified service
//! error taxonomy, connection-lifecycle errors, the content model returned
//! by tool calls, and the capability descriptors discovered from the server.

pub mod capability;
pub mod content;
pub mod error;

pub use capability::{PromptArgument, PromptDescriptor, ResourceDescriptor, ToolDescriptor};
pub use content::{CallResult, ContentItem, PromptMessage, PromptResult, ResourceBlock, ResourceContents};
pub use error::{ClientError, ConfigError, ConnectError, ErrorKind, ServiceError};
