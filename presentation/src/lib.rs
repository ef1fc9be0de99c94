//! Presentation layer for mcp-cli
//!
//! CLI argument parsing and output formatting. Contains no MCP or LLM
//! logic of its own — the `cli` binary crate wires this layer's parsed
//! arguments into the infrastructure adapters and application use cases.

pub mod cli;
pub mod output;

pub use cli::{Cli, Command, PromptsCommand, ResourcesCommand, ToolsCommand};
pub use output::{ConsoleFormatter, OutputFormat, ServerStatus};
