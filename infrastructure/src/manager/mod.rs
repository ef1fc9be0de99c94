//! Tool manager (C4): launches every configured server, aggregates their
//! catalogs into one namespace, and resolves a tool name under any of the
//! three accepted spellings before dispatching a call.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use mcp_application::ports::tool_executor::ToolExecutorPort;
use mcp_domain::{
    McpError, NamespacedTool, PromptDescriptor, ResourceDescriptor,
    ResourceTemplateDescriptor, ServerConfig, ServerLaunchDescriptor, ToolCallResult,
};
use serde_json::Value;
use tracing::{info, warn};

use crate::connection::{ConnectionState, ServerConnection};

/// What went wrong launching one server, kept alongside the ones that
/// started fine so a single bad entry in the launch descriptor doesn't
/// abort startup for the rest.
#[derive(Debug, Clone)]
pub struct StartupError {
    pub namespace: String,
    pub error: String,
}

/// The three spellings a tool name can arrive under, resolved against the
/// manager's aggregated catalog.
enum ResolvedName<'a> {
    Unique(&'a NamespacedTool),
    Ambiguous(Vec<String>),
    Unknown,
}

/// Aggregates every ready [`ServerConnection`] into one tool/prompt/
/// resource namespace.
pub struct ToolManager {
    connections: HashMap<String, Arc<ServerConnection>>,
    startup_errors: Vec<StartupError>,
    /// Flattened snapshot of every connected server's tools, refreshed by
    /// [`ToolManager::refresh_catalog`]. `ToolExecutorPort::list_tools` is
    /// synchronous, so the manager keeps this cache rather than locking
    /// each connection's own catalog on every read.
    tool_cache: RwLock<Vec<NamespacedTool>>,
    /// Forward map from the LLM-safe alias to the tool it was derived
    /// from. `encode_llm_safe_name` is lossy, so this explicit map is the
    /// only way back — never try to decode the alias textually.
    alias_index: RwLock<HashMap<String, Vec<String>>>,
}

impl ToolManager {
    /// Launch every server in `descriptor` concurrently. Never fails
    /// outright — a server that errors is recorded in `startup_errors`
    /// and simply excluded from the aggregated catalog.
    pub async fn start(descriptor: &ServerLaunchDescriptor) -> Self {
        let attempts = descriptor.mcp_servers.iter().map(|(namespace, config)| {
            let namespace = namespace.clone();
            let config = config.clone();
            async move {
                let result = ServerConnection::start(namespace.clone(), &config).await;
                (namespace, result)
            }
        });

        let results = futures::future::join_all(attempts).await;

        let mut connections = HashMap::new();
        let mut startup_errors = Vec::new();
        for (namespace, result) in results {
            match result {
                Ok(connection) => {
                    info!(%namespace, "server connected");
                    connections.insert(namespace, Arc::new(connection));
                }
                Err(err) => {
                    warn!(%namespace, %err, "server failed to start");
                    startup_errors.push(StartupError { namespace, error: err.to_string() });
                }
            }
        }

        let manager = Self {
            connections,
            startup_errors,
            tool_cache: RwLock::new(Vec::new()),
            alias_index: RwLock::new(HashMap::new()),
        };
        manager.refresh_catalog().await;
        manager
    }

    /// Start a manager over a caller-supplied set of connections. Used by
    /// tests that want to drive [`ToolManager`] without going through a
    /// launch descriptor.
    pub async fn from_connections(connections: HashMap<String, ServerConnection>) -> Self {
        let connections = connections.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        let manager = Self {
            connections,
            startup_errors: Vec::new(),
            tool_cache: RwLock::new(Vec::new()),
            alias_index: RwLock::new(HashMap::new()),
        };
        manager.refresh_catalog().await;
        manager
    }

    pub fn startup_errors(&self) -> &[StartupError] {
        &self.startup_errors
    }

    pub fn connected_servers(&self) -> Vec<&str> {
        self.connections.keys().map(String::as_str).collect()
    }

    pub fn connection(&self, namespace: &str) -> Option<&Arc<ServerConnection>> {
        self.connections.get(namespace)
    }

    /// Re-fetch every connected server's tool list and rebuild the alias
    /// index. Call after observing a `list_changed` notification, or at
    /// startup. Only `Ready` connections contribute — a `Degraded` server
    /// keeps its last-known tools out of the aggregated catalog until its
    /// health check brings it back.
    pub async fn refresh_catalog(&self) {
        let mut tools = Vec::new();
        for (namespace, connection) in &self.connections {
            if connection.state().await != ConnectionState::Ready {
                continue;
            }
            match connection.list_tools().await {
                Ok(descriptors) => {
                    for tool in descriptors {
                        tools.push(NamespacedTool::new(namespace.clone(), tool));
                    }
                }
                Err(err) => warn!(%namespace, %err, "failed to list tools"),
            }
        }

        let mut alias_index: HashMap<String, Vec<String>> = HashMap::new();
        for tool in &tools {
            alias_index.entry(tool.llm_safe_name()).or_default().push(tool.qualified_name());
        }

        *self.tool_cache.write().unwrap() = tools;
        *self.alias_index.write().unwrap() = alias_index;
    }

    pub fn get_unique_tools(&self) -> Vec<NamespacedTool> {
        self.tool_cache.read().unwrap().clone()
    }

    /// Resolve `name` against the aggregated catalog. Tries, in order:
    /// the fully-qualified `namespace.tool` spelling, the LLM-safe alias
    /// (via the explicit forward map, never by decoding the alias
    /// itself), then a bare tool name — which is ambiguous if more than
    /// one server exposes a tool by that name.
    fn resolve<'a>(&'a self, name: &str, cache: &'a [NamespacedTool]) -> ResolvedName<'a> {
        if let Some((namespace, bare)) = name.split_once('.') {
            if let Some(tool) = cache.iter().find(|t| t.namespace == namespace && t.tool.name == bare) {
                return ResolvedName::Unique(tool);
            }
        }

        if let Some(qualified_names) = self.alias_index.read().unwrap().get(name) {
            return match qualified_names.as_slice() {
                [only] => cache
                    .iter()
                    .find(|t| &t.qualified_name() == only)
                    .map(ResolvedName::Unique)
                    .unwrap_or(ResolvedName::Unknown),
                many => ResolvedName::Ambiguous(many.to_vec()),
            };
        }

        let matches: Vec<&NamespacedTool> = cache.iter().filter(|t| t.tool.name == name).collect();
        match matches.as_slice() {
            [] => ResolvedName::Unknown,
            [only] => ResolvedName::Unique(only),
            many => ResolvedName::Ambiguous(many.iter().map(|t| t.namespace.clone()).collect()),
        }
    }

    pub async fn call_prompt(&self, namespace: &str, name: &str, arguments: Value) -> Result<Value, McpError> {
        let connection = self.connections.get(namespace).ok_or_else(|| McpError::UnknownTool(namespace.to_string()))?;
        connection.get_prompt(name, arguments).await
    }

    pub async fn list_prompts(&self, namespace: &str) -> Result<Vec<PromptDescriptor>, McpError> {
        let connection = self.connections.get(namespace).ok_or_else(|| McpError::UnknownTool(namespace.to_string()))?;
        connection.list_prompts().await
    }

    pub async fn list_resources(&self, namespace: &str) -> Result<Vec<ResourceDescriptor>, McpError> {
        let connection = self.connections.get(namespace).ok_or_else(|| McpError::UnknownTool(namespace.to_string()))?;
        connection.list_resources().await
    }

    pub async fn list_resource_templates(
        &self,
        namespace: &str,
    ) -> Result<Vec<ResourceTemplateDescriptor>, McpError> {
        let connection = self.connections.get(namespace).ok_or_else(|| McpError::UnknownTool(namespace.to_string()))?;
        connection.list_resource_templates().await
    }

    pub async fn read_resource(&self, namespace: &str, uri: &str) -> Result<Value, McpError> {
        let connection = self.connections.get(namespace).ok_or_else(|| McpError::UnknownTool(namespace.to_string()))?;
        connection.read_resource(uri).await
    }

    pub async fn ping(&self, namespace: &str) -> Result<bool, McpError> {
        let connection = self.connections.get(namespace).ok_or_else(|| McpError::UnknownTool(namespace.to_string()))?;
        Ok(connection.ping().await)
    }

    /// Close every server connection. Idempotent per connection.
    pub async fn shutdown(&self) {
        for (namespace, connection) in &self.connections {
            info!(%namespace, "closing server connection");
            connection.close().await;
        }
    }

}

#[async_trait]
impl ToolExecutorPort for ToolManager {
    fn list_tools(&self) -> Vec<NamespacedTool> {
        self.get_unique_tools()
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let cache = self.tool_cache.read().unwrap().clone();
        let resolved = match self.resolve(name, &cache) {
            ResolvedName::Unique(tool) => tool.clone(),
            ResolvedName::Ambiguous(namespaces) => {
                return Err(McpError::AmbiguousToolName { name: name.to_string(), namespaces })
            }
            ResolvedName::Unknown => return Err(McpError::UnknownTool(name.to_string())),
        };

        let connection = self
            .connections
            .get(&resolved.namespace)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?;
        connection.call_tool(&resolved.tool.name, arguments).await
    }
}
