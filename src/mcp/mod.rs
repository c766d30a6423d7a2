//! Model Context Protocol support.
//!
//! Two halves live here: the tool-server client (`session`, `supervisor`,
//! `transport`) that feeds tool definitions into Anthropic requests, and the
//! context service (`service`) that keeps per-provider conversation logs.

pub mod error;
pub mod events;
pub mod openai_provider;
pub mod protocol;
pub mod service;
pub mod session;
pub mod supervisor;
pub mod tools;
pub mod transport;
pub mod types;

pub use error::McpClientError;
pub use service::{ContextProvider, McpContextService};
pub use session::{McpSession, SessionState, SessionStatus};
pub use supervisor::{Backoff, SupervisedSession};
pub use tools::McpTool;
