//! Catalog types: everything a server advertises, and the namespaced view
//! the tool manager builds over many servers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// An opaque pagination cursor returned by a `list` call.
///
/// Kept as a newtype rather than a bare `String` so call sites can't
/// confuse a cursor with a tool or server name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(pub String);

/// What a server told us about itself during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub capabilities: ServerCapabilities,
}

/// Which optional method families a server declared support for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default)]
    pub tools: bool,
    #[serde(default)]
    pub prompts: bool,
    #[serde(default)]
    pub resources: bool,
    #[serde(default)]
    pub logging: bool,
}

/// A tool as advertised by a single server, before namespacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// A tool qualified by the server that owns it. `(namespace, name)` is
/// globally unique across the tool manager's aggregated catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespacedTool {
    pub namespace: String,
    pub tool: ToolDescriptor,
}

impl NamespacedTool {
    pub fn new(namespace: impl Into<String>, tool: ToolDescriptor) -> Self {
        Self {
            namespace: namespace.into(),
            tool,
        }
    }

    /// The `namespace.name` fully-qualified spelling.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.namespace, self.tool.name)
    }

    /// The LLM-safe alias: `namespace_name` with every character outside
    /// `[A-Za-z0-9_-]` replaced by `_`.
    pub fn llm_safe_name(&self) -> String {
        encode_llm_safe_name(&self.namespace, &self.tool.name)
    }
}

/// Encode a `(namespace, name)` pair into the LLM-safe alias alphabet.
///
/// Deterministic but not injective — two distinct pairs can collide after
/// sanitization. Callers that need the inverse must keep an explicit
/// forward map built from a live catalog (see the tool manager); this
/// function alone cannot be un-applied reliably.
pub fn encode_llm_safe_name(namespace: &str, name: &str) -> String {
    let joined = format!("{namespace}_{name}");
    joined
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

/// A prompt template as advertised by a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
}

/// A resource as advertised by a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

/// A resource template (URI pattern) as advertised by a server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTemplateDescriptor {
    #[serde(rename = "uriTemplate")]
    pub uri_template: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// The outcome of a single `tools/call` dispatch.
///
/// `success=false` never carries a Rust error — transport and protocol
/// failures are folded into `error` so the chat loop can always embed
/// the result as a `tool` conversation record instead of propagating a
/// panic-shaped failure up through the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool_name: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub execution_time_ms: u64,
}

impl ToolCallResult {
    pub fn success(tool_name: impl Into<String>, result: Value, elapsed: Duration) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: true,
            result: Some(result),
            error: None,
            execution_time_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn failure(tool_name: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            tool_name: tool_name.into(),
            success: false,
            result: None,
            error: Some(error.into()),
            execution_time_ms: elapsed.as_millis() as u64,
        }
    }

    /// Render as the `content` string a `tool` conversation record wants.
    pub fn as_content(&self) -> String {
        if self.success {
            self.result
                .as_ref()
                .map(|v| v.to_string())
                .unwrap_or_default()
        } else {
            format!("error: {}", self.error.as_deref().unwrap_or("unknown error"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn qualified_name_joins_namespace_and_name() {
        let tool = NamespacedTool::new(
            "filesystem",
            ToolDescriptor {
                name: "read_file".into(),
                description: "".into(),
                input_schema: json!({"type":"object","properties":{}}),
            },
        );
        assert_eq!(tool.qualified_name(), "filesystem.read_file");
    }

    #[test]
    fn failure_content_is_prefixed() {
        let r = ToolCallResult::failure("echo", "boom", Duration::from_millis(5));
        assert_eq!(r.as_content(), "error: boom");
    }

    #[test]
    fn success_content_is_raw_json() {
        let r = ToolCallResult::success("echo", json!({"x":1}), Duration::from_millis(5));
        assert_eq!(r.as_content(), "{\"x\":1}");
    }

    #[test]
    fn encode_llm_safe_name_sanitizes_special_characters() {
        assert_eq!(encode_llm_safe_name("file.system", "read/file"), "file_system_read_file");
    }

    #[test]
    fn encode_llm_safe_name_preserves_clean_input() {
        assert_eq!(encode_llm_safe_name("filesystem", "read_file"), "filesystem_read_file");
    }
}
