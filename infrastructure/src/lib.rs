//! Infrastructure layer for mcp-cli
//!
//! Adapters that implement the application layer's ports: the stdio
//! transport and JSON-RPC session (C1/C2), the server connection and tool
//! manager (C3/C4), config file loading, structured conversation logging,
//! and the LLM provider adapter.

pub mod config;
pub mod connection;
pub mod logging;
pub mod manager;
pub mod providers;
pub mod session;
pub mod transport;

pub use config::{load_provider_config, load_server_launch_descriptor};
pub use connection::{ConnectionState, ServerConnection};
pub use logging::JsonlConversationLogger;
pub use manager::{StartupError, ToolManager};
pub use providers::{OpenAiCompatibleProvider, ProviderRegistry};
pub use session::JsonRpcSession;
pub use transport::FramedStdioTransport;
