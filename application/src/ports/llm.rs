//! LLM provider port.
//!
//! This is the external collaborator the chat orchestrator drives: it
//! knows nothing about HTTP, API keys, or any specific vendor's wire
//! format — adapters in the infrastructure layer own that.

use async_trait::async_trait;
use mcp_domain::Message;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by an LLM provider adapter.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("model not available: {0}")]
    ModelNotAvailable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("request timed out")]
    Timeout,
}

/// A tool declaration in the shape a provider's API expects: name,
/// description, and a JSON-Schema parameter object.
#[derive(Debug, Clone)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A tool call the model asked for.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    /// As delivered by the provider: either a JSON string or an object.
    /// The orchestrator normalizes this before dispatch.
    pub arguments: Value,
}

/// The result of one model turn.
#[derive(Debug, Clone, Default)]
pub struct CompletionResult {
    pub response: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Port for requesting completions from an LLM.
///
/// Implementations (adapters) live in the infrastructure layer and speak
/// to a specific provider's API.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Request the next turn given the conversation so far and the tool
    /// declarations currently available. `tools` is empty if no server
    /// is ready yet.
    async fn create_completion(
        &self,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<CompletionResult, GatewayError>;

    /// The model name this provider is configured to use.
    fn model(&self) -> &str;
}
