//! Server connection (C3): one server's lifecycle state machine, layered
//! over a [`JsonRpcSession`] — handshake, cached catalogs invalidated by
//! `list_changed` notifications, and the per-call timeout/retry policy.

use std::sync::Arc;
use std::time::Duration;

use mcp_domain::{
    Cursor, McpError, PromptDescriptor, ResourceDescriptor, ResourceTemplateDescriptor, ServerConfig,
    ServerInfo, ToolCallResult, ToolDescriptor,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::session::JsonRpcSession;
use crate::transport::FramedStdioTransport;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const CALL_TIMEOUT: Duration = Duration::from_secs(10);
const CALL_RETRIES: u32 = 2;
const LIST_TIMEOUT: Duration = Duration::from_secs(10);
/// How often the background health check pings a READY/DEGRADED
/// connection, independent of any ping a caller issues directly.
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    New,
    Handshaking,
    Ready,
    Degraded,
    Closed,
}

struct Catalogs {
    tools: Option<Vec<ToolDescriptor>>,
    prompts: Option<Vec<PromptDescriptor>>,
    resources: Option<Vec<ResourceDescriptor>>,
    resource_templates: Option<Vec<ResourceTemplateDescriptor>>,
}

impl Catalogs {
    fn empty() -> Self {
        Self { tools: None, prompts: None, resources: None, resource_templates: None }
    }
}

/// One MCP server, from subprocess launch through graceful shutdown.
pub struct ServerConnection {
    pub namespace: String,
    session: Arc<JsonRpcSession>,
    state: Arc<Mutex<ConnectionState>>,
    catalogs: Arc<Mutex<Catalogs>>,
}

impl ServerConnection {
    /// Spawn the subprocess and perform the `initialize` handshake,
    /// failing with [`McpError::Startup`] if it does not complete within
    /// [`HANDSHAKE_TIMEOUT`].
    pub async fn start(namespace: impl Into<String>, config: &ServerConfig) -> Result<Self, McpError> {
        let namespace = namespace.into();
        let (transport, messages, diagnostics) = FramedStdioTransport::spawn(config).await?;
        let session = JsonRpcSession::new(transport, messages, diagnostics);

        let connection = Self {
            namespace: namespace.clone(),
            session: Arc::new(session),
            state: Arc::new(Mutex::new(ConnectionState::Handshaking)),
            catalogs: Arc::new(Mutex::new(Catalogs::empty())),
        };

        let params = serde_json::json!({
            "protocolVersion": "2024-11-05",
            "clientInfo": {"name": "mcp-cli", "version": env!("CARGO_PKG_VERSION")},
            "capabilities": {},
        });

        match tokio::time::timeout(HANDSHAKE_TIMEOUT, connection.session.initialize(params, HANDSHAKE_TIMEOUT)).await {
            Ok(Ok(_info)) => {
                *connection.state.lock().await = ConnectionState::Ready;
                info!(namespace = %connection.namespace, "server ready");
            }
            Ok(Err(err)) => {
                *connection.state.lock().await = ConnectionState::Closed;
                connection.session.close().await;
                return Err(err);
            }
            Err(_) => {
                *connection.state.lock().await = ConnectionState::Closed;
                connection.session.close().await;
                return Err(McpError::Startup(format!(
                    "`{}` did not complete initialize within {HANDSHAKE_TIMEOUT:?}",
                    config.command
                )));
            }
        }

        connection.spawn_invalidation_watchers().await;
        connection.spawn_health_check_loop();

        Ok(connection)
    }

    /// Subscribe to each `list_changed` notification and clear the
    /// corresponding cache entry in place so the next `list_*` call
    /// re-fetches. Runs for the connection's lifetime; the subscriber
    /// channel closes on its own once the session is closed.
    async fn spawn_invalidation_watchers(&self) {
        for (method, clear): (&str, fn(&mut Catalogs)) in [
            ("notifications/tools/list_changed", (|c: &mut Catalogs| c.tools = None) as fn(&mut Catalogs)),
            ("notifications/prompts/list_changed", |c: &mut Catalogs| c.prompts = None),
            ("notifications/resources/list_changed", |c: &mut Catalogs| {
                c.resources = None;
                c.resource_templates = None;
            }),
        ] {
            let mut rx = self.session.subscribe_notification(method).await;
            let catalogs = self.catalogs.clone();
            let namespace = self.namespace.clone();
            tokio::spawn(async move {
                while rx.recv().await.is_some() {
                    tracing::debug!(%namespace, %method, "catalog invalidated");
                    clear(&mut *catalogs.lock().await);
                }
            });
        }
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.lock().await
    }

    pub fn server_info(&self) -> impl std::future::Future<Output = Option<ServerInfo>> + '_ {
        self.session.server_info()
    }

    /// Ping the server and update `state` to reflect the outcome:
    /// `Ready` on success, `Degraded` on failure. A `Closed` connection
    /// is left alone — there is nothing to recover.
    pub async fn ping(&self) -> bool {
        Self::ping_and_update_state(&self.session, &self.state).await
    }

    async fn ping_and_update_state(session: &JsonRpcSession, state: &Mutex<ConnectionState>) -> bool {
        let alive = session.ping().await;
        let mut guard = state.lock().await;
        if *guard != ConnectionState::Closed {
            *guard = if alive { ConnectionState::Ready } else { ConnectionState::Degraded };
        }
        alive
    }

    /// Periodically ping this connection so a `Degraded` server recovers
    /// to `Ready` (or a `Ready` server is caught going `Degraded`) without
    /// needing a caller-issued `tools/call` or explicit `ping` in between.
    /// Spec's "may retry initialization" allows a connection to come back;
    /// this loop is what actually drives `Degraded -> Ready`.
    fn spawn_health_check_loop(&self) {
        let session = self.session.clone();
        let state = self.state.clone();
        let namespace = self.namespace.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_CHECK_INTERVAL);
            ticker.tick().await; // first tick fires immediately, skip it
            loop {
                ticker.tick().await;
                if *state.lock().await == ConnectionState::Closed {
                    break;
                }
                let alive = Self::ping_and_update_state(&session, &state).await;
                tracing::debug!(%namespace, alive, "health check");
                if *state.lock().await == ConnectionState::Closed {
                    break;
                }
            }
        });
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        {
            let cached = self.catalogs.lock().await;
            if let Some(tools) = &cached.tools {
                return Ok(tools.clone());
            }
        }
        let tools = self.paginate("tools/list", "tools").await?;
        self.catalogs.lock().await.tools = Some(tools.clone());
        Ok(tools)
    }

    pub async fn list_prompts(&self) -> Result<Vec<PromptDescriptor>, McpError> {
        {
            let cached = self.catalogs.lock().await;
            if let Some(prompts) = &cached.prompts {
                return Ok(prompts.clone());
            }
        }
        let prompts = self.paginate("prompts/list", "prompts").await?;
        self.catalogs.lock().await.prompts = Some(prompts.clone());
        Ok(prompts)
    }

    pub async fn list_resources(&self) -> Result<Vec<ResourceDescriptor>, McpError> {
        {
            let cached = self.catalogs.lock().await;
            if let Some(resources) = &cached.resources {
                return Ok(resources.clone());
            }
        }
        let resources = self.paginate("resources/list", "resources").await?;
        self.catalogs.lock().await.resources = Some(resources.clone());
        Ok(resources)
    }

    pub async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplateDescriptor>, McpError> {
        {
            let cached = self.catalogs.lock().await;
            if let Some(templates) = &cached.resource_templates {
                return Ok(templates.clone());
            }
        }
        let templates = self.paginate("resources/templates/list", "resourceTemplates").await?;
        self.catalogs.lock().await.resource_templates = Some(templates.clone());
        Ok(templates)
    }

    /// Invalidate every cached catalog, forcing the next `list_*` call to
    /// re-fetch. Called by the tool manager when it observes a
    /// `list_changed` notification for this server.
    pub async fn invalidate_catalogs(&self) {
        let mut catalogs = self.catalogs.lock().await;
        *catalogs = Catalogs::empty();
    }

    async fn paginate<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        field: &str,
    ) -> Result<Vec<T>, McpError> {
        let mut items = Vec::new();
        let mut cursor: Option<Cursor> = None;
        loop {
            let params = cursor
                .as_ref()
                .map(|c| serde_json::json!({"cursor": c.0}));
            let result = self
                .session
                .send_request(method, params, LIST_TIMEOUT, CALL_RETRIES)
                .await?;
            let page: Vec<T> = result
                .get(field)
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| McpError::Protocol(e.to_string()))?
                .unwrap_or_default();
            items.extend(page);

            cursor = result
                .get("nextCursor")
                .and_then(|v| v.as_str())
                .map(|s| Cursor(s.to_string()));
            if cursor.is_none() {
                break;
            }
        }
        Ok(items)
    }

    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        let started = std::time::Instant::now();
        let params = serde_json::json!({"name": name, "arguments": arguments});
        match self
            .session
            .send_request("tools/call", Some(params), CALL_TIMEOUT, CALL_RETRIES)
            .await
        {
            Ok(result) if result.get("isError").and_then(Value::as_bool).unwrap_or(false) => {
                let message = result
                    .get("content")
                    .and_then(|c| c.as_array())
                    .and_then(|items| items.iter().find_map(|item| item.get("text").and_then(|t| t.as_str())))
                    .unwrap_or("tool reported an error")
                    .to_string();
                Ok(ToolCallResult::failure(name, message, started.elapsed()))
            }
            Ok(result) => Ok(ToolCallResult::success(name, result, started.elapsed())),
            Err(McpError::Cancelled) => Err(McpError::Cancelled),
            Err(err @ McpError::Transport(_)) => {
                *self.state.lock().await = ConnectionState::Degraded;
                warn!(tool = %name, %err, "tool call failed, connection degraded");
                Ok(ToolCallResult::failure(name, err.to_string(), started.elapsed()))
            }
            Err(err) => {
                warn!(tool = %name, %err, "tool call failed");
                Ok(ToolCallResult::failure(name, err.to_string(), started.elapsed()))
            }
        }
    }

    pub async fn get_prompt(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let params = serde_json::json!({"name": name, "arguments": arguments});
        self.session.send_request("prompts/get", Some(params), CALL_TIMEOUT, CALL_RETRIES).await
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
        let params = serde_json::json!({"uri": uri});
        self.session.send_request("resources/read", Some(params), CALL_TIMEOUT, CALL_RETRIES).await
    }

    pub async fn subscribe_resource(&self, uri: &str) -> Result<Value, McpError> {
        let params = serde_json::json!({"uri": uri});
        self.session.send_request("resources/subscribe", Some(params), CALL_TIMEOUT, CALL_RETRIES).await
    }

    /// Close the underlying session. Idempotent.
    pub async fn close(&self) {
        *self.state.lock().await = ConnectionState::Closed;
        self.session.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn script_config(body: &str) -> (tempfile::TempDir, ServerConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake_server.py");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{body}").unwrap();
        drop(file);
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        let config = ServerConfig::new("python3").with_args([path.to_str().unwrap().to_string()]);
        (dir, config)
    }

    const PAGED_TOOLS_SERVER: &str = r#"
import sys, json
for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    msg = json.loads(line)
    method = msg.get("method")
    if method == "initialize":
        print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{"name":"fake","version":"1"}}))
    elif method == "tools/list":
        cursor = (msg.get("params") or {}).get("cursor")
        if cursor is None:
            print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{
                "tools":[{"name":"a","inputSchema":{"type":"object","properties":{}}}],
                "nextCursor":"page2"
            }}))
        else:
            print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{
                "tools":[{"name":"b","inputSchema":{"type":"object","properties":{}}}]
            }}))
    elif method == "tools/call":
        print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{"content":[{"type":"text","text":"ok"}]}}))
    sys.stdout.flush()
"#;

    #[tokio::test]
    async fn handshake_then_paginated_list_and_cache() {
        let (_dir, config) = script_config(PAGED_TOOLS_SERVER);
        let connection = ServerConnection::start("fake", &config).await.unwrap();
        assert_eq!(connection.state().await, ConnectionState::Ready);

        let tools = connection.list_tools().await.unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "a");
        assert_eq!(tools[1].name, "b");

        // Second call must hit the cache, not re-issue tools/list.
        let cached = connection.list_tools().await.unwrap();
        assert_eq!(cached.len(), 2);

        let result = connection.call_tool("a", serde_json::json!({})).await.unwrap();
        assert!(result.success);

        connection.close().await;
    }

    const IS_ERROR_TOOLS_SERVER: &str = r#"
import sys, json
for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    msg = json.loads(line)
    method = msg.get("method")
    if method == "initialize":
        print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{"name":"fake","version":"1"}}))
    elif method == "tools/call":
        print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{
            "isError": True,
            "content":[{"type":"text","text":"division by zero"}]
        }}))
    sys.stdout.flush()
"#;

    #[tokio::test]
    async fn tool_result_with_is_error_flag_is_a_failure() {
        let (_dir, config) = script_config(IS_ERROR_TOOLS_SERVER);
        let connection = ServerConnection::start("fake", &config).await.unwrap();

        let result = connection.call_tool("divide", serde_json::json!({})).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("division by zero"));

        connection.close().await;
    }
}
