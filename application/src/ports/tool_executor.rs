//! Tool executor port.
//!
//! Defines how the application layer reaches the aggregated, multi-server
//! tool catalog. The implementation (the tool manager) lives in the
//! infrastructure layer and owns every server connection.

use async_trait::async_trait;
use mcp_domain::{McpError, NamespacedTool, ToolCallResult};
use serde_json::Value;

/// Port for executing tools across however many servers are connected.
#[async_trait]
pub trait ToolExecutorPort: Send + Sync {
    /// The unified catalog: every READY server's tools, namespaced.
    fn list_tools(&self) -> Vec<NamespacedTool>;

    /// Resolve and invoke a tool by any of the three accepted spellings
    /// (fully-qualified, LLM-safe alias, or bare name) — see the name
    /// resolution rules the implementation documents.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError>;
}
