//! Application layer for mcp-cli
//!
//! This crate contains use cases and port definitions.
//! It depends only on the domain layer.

pub mod ports;
pub mod use_cases;

// Re-export commonly used types
pub use ports::llm::LlmProvider;
pub use ports::tool_executor::ToolExecutorPort;
pub use use_cases::chat::ChatOrchestrator;
