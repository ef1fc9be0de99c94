use mcp_domain::ServerInfo;
use serde::Serialize;

/// A connected-or-not summary for one configured server, as shown by
/// `mcp-cli servers`.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub namespace: String,
    pub ready: bool,
    pub info: Option<ServerInfo>,
    pub error: Option<String>,
}
