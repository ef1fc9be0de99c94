//! The server launch descriptor: what to spawn, and under what name.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How to launch one MCP server subprocess.
///
/// `env` is merged over the parent process's environment — entries here
/// win on conflict, everything else is inherited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ServerConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// The `{"mcpServers": {...}}` document, keyed by the server's display
/// name (which doubles as its catalog namespace).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerLaunchDescriptor {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: HashMap<String, ServerConfig>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_mcp_servers_map() {
        let json = r#"{"mcpServers":{"filesystem":{"command":"mcp-fs","args":["--root","/tmp"]}}}"#;
        let descriptor: ServerLaunchDescriptor = serde_json::from_str(json).unwrap();
        let server = descriptor.mcp_servers.get("filesystem").unwrap();
        assert_eq!(server.command, "mcp-fs");
        assert_eq!(server.args, vec!["--root", "/tmp"]);
    }

    #[test]
    fn env_defaults_empty() {
        let json = r#"{"mcpServers":{"s":{"command":"x"}}}"#;
        let descriptor: ServerLaunchDescriptor = serde_json::from_str(json).unwrap();
        assert!(descriptor.mcp_servers.get("s").unwrap().env.is_empty());
    }
}
