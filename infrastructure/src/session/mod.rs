//! JSON-RPC session (C2): one session wraps one transport, correlates
//! requests with responses by id, fans notifications out to subscribers,
//! and applies the timeout/retry policy from the error taxonomy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mcp_domain::{classify_message, McpError, Message as WireMessage, Request, ServerInfo};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::transport::{FramedStdioTransport, MalformedLine};

/// Default 5s liveness check used by [`JsonRpcSession::ping`].
const PING_TIMEOUT: Duration = Duration::from_secs(5);

/// Backoff schedule for retryable errors: 50ms, 100ms, 200ms, capped at 1s.
fn backoff_for_attempt(attempt: u32) -> Duration {
    let millis = 50u64.saturating_mul(1u64 << attempt.min(4));
    Duration::from_millis(millis.min(1000))
}

type PendingTable = Arc<Mutex<HashMap<String, oneshot::Sender<Result<Value, McpError>>>>>;
type SubscriberTable = Arc<Mutex<HashMap<String, Vec<mpsc::UnboundedSender<Value>>>>>;

/// Removes its request id from the pending table when dropped, whether
/// that happens because a response arrived, the call timed out, or the
/// calling future was itself dropped mid-await (e.g. `run_turn`'s
/// `tokio::select!` picking `cancel.cancelled()` over an in-flight
/// `send_request`). Without this, a cancelled call leaks its entry until
/// a stray late response arrives or the session closes.
struct PendingGuard {
    pending: PendingTable,
    id: String,
    armed: bool,
}

impl PendingGuard {
    /// Call once the entry has already been (or is about to be) removed
    /// synchronously on a normal completion path, so `Drop` doesn't spawn
    /// a redundant no-op cleanup task.
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let pending = self.pending.clone();
        let id = std::mem::take(&mut self.id);
        tokio::spawn(async move {
            pending.lock().await.remove(&id);
        });
    }
}

/// A session over one MCP server subprocess.
pub struct JsonRpcSession {
    transport: Arc<FramedStdioTransport>,
    pending: PendingTable,
    subscribers: SubscriberTable,
    reader_task: JoinHandle<()>,
    closed: Arc<AtomicBool>,
    server_info: Mutex<Option<ServerInfo>>,
}

impl JsonRpcSession {
    /// Wrap a freshly spawned transport. Does not perform the `initialize`
    /// handshake — call [`JsonRpcSession::initialize`] before anything else.
    pub fn new(
        transport: FramedStdioTransport,
        messages: mpsc::UnboundedReceiver<Value>,
        diagnostics: mpsc::UnboundedReceiver<MalformedLine>,
    ) -> Self {
        let transport = Arc::new(transport);
        let pending: PendingTable = Arc::new(Mutex::new(HashMap::new()));
        let subscribers: SubscriberTable = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let reader_task = tokio::spawn(reader_loop(
            messages,
            diagnostics,
            pending.clone(),
            subscribers.clone(),
            closed.clone(),
        ));

        Self {
            transport,
            pending,
            subscribers,
            reader_task,
            closed,
            server_info: Mutex::new(None),
        }
    }

    /// Perform the `initialize` handshake and cache the server's
    /// `ServerInfo` for [`JsonRpcSession::server_info`].
    pub async fn initialize(&self, params: Value, timeout: Duration) -> Result<ServerInfo, McpError> {
        let result = self.send_request("initialize", Some(params), timeout, 0).await?;
        let info: ServerInfo = serde_json::from_value(result).map_err(|e| McpError::Protocol(e.to_string()))?;
        *self.server_info.lock().await = Some(info.clone());
        Ok(info)
    }

    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.lock().await.clone()
    }

    /// Send a request, retrying retryable errors up to `retries` times
    /// with the exponential backoff in [`backoff_for_attempt`]. Each
    /// retry uses a fresh request id; the caller sees one logical call.
    pub async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
        retries: u32,
    ) -> Result<Value, McpError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(McpError::Transport("connection lost".into()));
        }

        let mut attempt = 0u32;
        loop {
            let id = Request::generate_id();
            let request = Request::new(id.clone(), method, params.clone());

            let (tx, rx) = oneshot::channel();
            self.pending.lock().await.insert(id.clone(), tx);
            let mut guard = PendingGuard { pending: self.pending.clone(), id: id.clone(), armed: true };

            let value = serde_json::to_value(&request).map_err(|e| McpError::Protocol(e.to_string()))?;
            if let Err(err) = self.transport.send_line(&value) {
                guard.disarm();
                self.pending.lock().await.remove(&id);
                return Err(err);
            }

            let outcome = match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(result)) => result,
                Ok(Err(_)) => Err(McpError::Transport("connection lost".into())),
                Err(_) => {
                    self.pending.lock().await.remove(&id);
                    Err(McpError::Timeout(timeout))
                }
            };
            // The entry is already gone by this point on every path above
            // (`dispatch` removed it, or we just did); disarm so `Drop`
            // doesn't spawn a redundant cleanup task. If this future is
            // dropped before reaching here instead, the guard stays armed
            // and its `Drop` impl does the cleanup.
            guard.disarm();

            match outcome {
                Ok(result) => return Ok(result),
                Err(err) if err.is_retryable() && attempt < retries => {
                    attempt += 1;
                    debug!(method, attempt, "retrying after {err}");
                    tokio::time::sleep(backoff_for_attempt(attempt - 1)).await;
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Fire-and-forget: no id, no waiting.
    pub fn send_notification(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let mut value = serde_json::json!({"jsonrpc": "2.0", "method": method});
        if let Some(params) = params {
            value["params"] = params;
        }
        self.transport.send_line(&value)
    }

    /// Subscribe to notifications for `method`. Multiple subscribers per
    /// method are supported — every one receives every matching
    /// notification's `params`.
    pub async fn subscribe_notification(&self, method: &str) -> mpsc::UnboundedReceiver<Value> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .await
            .entry(method.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// True iff any response (success or error) arrives within 5s.
    pub async fn ping(&self) -> bool {
        match self.send_request("ping", None, PING_TIMEOUT, 0).await {
            Ok(_) => true,
            Err(McpError::Method { .. }) => true,
            Err(_) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear down the reader task and fail every outstanding request with
    /// `ConnectionClosed`-shaped [`McpError::Transport`].
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.reader_task.abort();
        self.transport.close().await;
        let mut pending = self.pending.lock().await;
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err(McpError::Transport("connection closed".into())));
        }
    }
}

async fn reader_loop(
    mut messages: mpsc::UnboundedReceiver<Value>,
    mut diagnostics: mpsc::UnboundedReceiver<MalformedLine>,
    pending: PendingTable,
    subscribers: SubscriberTable,
    closed: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            message = messages.recv() => {
                match message {
                    Some(value) => dispatch(value, &pending, &subscribers).await,
                    None => break,
                }
            }
            diag = diagnostics.recv() => {
                if let Some(bad) = diag {
                    warn!(raw = %bad.raw, error = %bad.error, "dropped malformed line");
                }
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    let mut pending = pending.lock().await;
    for (_, tx) in pending.drain() {
        let _ = tx.send(Err(McpError::Transport("connection lost".into())));
    }
}

async fn dispatch(value: Value, pending: &PendingTable, subscribers: &SubscriberTable) {
    match classify_message(&value) {
        WireMessage::Response(response) => {
            let sender = pending.lock().await.remove(&response.id);
            let Some(tx) = sender else {
                warn!(id = %response.id, "late or unmatched response, dropping");
                return;
            };
            let outcome = match response.error {
                Some(err) => Err(McpError::Method {
                    code: err.code,
                    message: err.message,
                    data: err.data,
                }),
                None => Ok(response.result.unwrap_or(Value::Null)),
            };
            let _ = tx.send(outcome);
        }
        WireMessage::IncomingRequest { id, method, .. } => {
            warn!(%id, %method, "server sent a request this client does not serve, dropping");
        }
        WireMessage::Notification(notification) => {
            trace!(method = %notification.method, "notification");
            let mut subs = subscribers.lock().await;
            if let Some(senders) = subs.get_mut(&notification.method) {
                let params = notification.params.unwrap_or(Value::Null);
                senders.retain(|tx| tx.send(params.clone()).is_ok());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_domain::ServerConfig;
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

    async fn session_for(body: &str) -> (tempfile::TempDir, JsonRpcSession) {
        let (dir, config) = script_config(body);
        let (transport, messages, diagnostics) = FramedStdioTransport::spawn(&config).await.unwrap();
        (dir, JsonRpcSession::new(transport, messages, diagnostics))
    }

    const ECHO_PING_SERVER: &str = r#"
import sys, json
for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    msg = json.loads(line)
    if msg.get("method") == "initialize":
        print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{"name":"fake","version":"1"}}))
    elif msg.get("method") == "ping":
        print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{}}))
    sys.stdout.flush()
"#;

    #[tokio::test]
    async fn handshake_then_ping() {
        let (_dir, session) = session_for(ECHO_PING_SERVER).await;
        let info = session
            .initialize(serde_json::json!({"name":"test-client"}), Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(info.name, "fake");
        assert!(session.ping().await);
        session.close().await;
    }

    const RETRY_THEN_SUCCEED_SERVER: &str = r#"
import sys, json
count = 0
for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    msg = json.loads(line)
    if msg.get("method") == "tools/list":
        count += 1
        if count == 1:
            print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"error":{"code":-32000,"message":"busy"}}))
        else:
            print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"result":{"tools":[{"name":"echo","description":"","inputSchema":{"type":"object","properties":{}}}]}}))
    sys.stdout.flush()
"#;

    #[tokio::test]
    async fn retries_on_retryable_error() {
        let (_dir, session) = session_for(RETRY_THEN_SUCCEED_SERVER).await;
        let result = session
            .send_request("tools/list", None, Duration::from_secs(2), 3)
            .await
            .unwrap();
        assert_eq!(result["tools"][0]["name"], "echo");
        session.close().await;
    }

    const METHOD_NOT_FOUND_SERVER: &str = r#"
import sys, json
for line in sys.stdin:
    line = line.strip()
    if not line:
        continue
    msg = json.loads(line)
    print(json.dumps({"jsonrpc":"2.0","id":msg["id"],"error":{"code":-32601,"message":"nope"}}))
    sys.stdout.flush()
"#;

    #[tokio::test]
    async fn non_retryable_error_fails_after_one_attempt() {
        let (_dir, session) = session_for(METHOD_NOT_FOUND_SERVER).await;
        let err = session
            .send_request("tools/list", None, Duration::from_secs(2), 3)
            .await
            .unwrap_err();
        match err {
            McpError::Method { code, .. } => assert_eq!(code, -32601),
            other => panic!("expected Method error, got {other:?}"),
        }
        session.close().await;
    }

    const SILENT_SERVER: &str = r#"
import sys
for line in sys.stdin:
    pass
"#;

    #[tokio::test]
    async fn timeout_when_server_never_responds() {
        let (_dir, session) = session_for(SILENT_SERVER).await;
        let start = std::time::Instant::now();
        let err = session
            .send_request("tools/list", None, Duration::from_millis(100), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Timeout(_)));
        assert!(start.elapsed() < Duration::from_millis(150));
        assert!(session.pending.lock().await.is_empty());
        session.close().await;
    }
}
