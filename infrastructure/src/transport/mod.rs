//! Framed stdio transport (C1): launches an MCP server subprocess and
//! exposes it as a stream of parsed JSON messages plus a line writer.
//!
//! Framing is one JSON object per `\n`-terminated line, UTF-8. Parsing
//! happens here so the session layer (C2) only ever sees `serde_json::Value`
//! or a diagnostic for a line that didn't parse — a malformed line never
//! tears down the transport, it's just dropped after being reported.

use std::process::Stdio;
use std::time::Duration;

use mcp_domain::{McpError, ServerConfig};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

/// How long `close()` waits for the child to exit after its stdin is
/// closed before it is killed outright.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);

/// A line that failed to parse as JSON, reported for diagnostics.
#[derive(Debug, Clone)]
pub struct MalformedLine {
    pub raw: String,
    pub error: String,
}

/// The running subprocess plus its framed message stream.
///
/// `recv_messages` and `recv_diagnostics` are handed back by [`spawn`] for
/// the session layer to own directly; `FramedStdioTransport` itself only
/// keeps what's needed to write lines and to shut the child down.
pub struct FramedStdioTransport {
    writer_tx: mpsc::UnboundedSender<String>,
    child: Mutex<Option<Child>>,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl FramedStdioTransport {
    /// Launch `config.command` with `config.args`, merging `config.env`
    /// over the parent environment. Stderr is inherited so server
    /// diagnostics surface directly on the client's own stderr.
    pub async fn spawn(
        config: &ServerConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<Value>, mpsc::UnboundedReceiver<MalformedLine>), McpError> {
        let mut command = Command::new(&config.command);
        command
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        debug!(command = %config.command, args = ?config.args, "spawning MCP server");

        let mut child = command
            .spawn()
            .map_err(|e| McpError::Startup(format!("failed to spawn `{}`: {e}", config.command)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Startup("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Startup("child stdout unavailable".into()))?;

        let (writer_tx, writer_rx) = mpsc::unbounded_channel::<String>();
        let (message_tx, message_rx) = mpsc::unbounded_channel::<Value>();
        let (diag_tx, diag_rx) = mpsc::unbounded_channel::<MalformedLine>();

        let writer_task = tokio::spawn(writer_loop(stdin, writer_rx));
        let reader_task = tokio::spawn(reader_loop(stdout, message_tx, diag_tx));

        Ok((
            Self {
                writer_tx,
                child: Mutex::new(Some(child)),
                reader_task,
                writer_task,
            },
            message_rx,
            diag_rx,
        ))
    }

    /// Serialize `value` to a single line and hand it to the writer task.
    /// Lines must not contain embedded newlines — `to_string` on a
    /// `serde_json::Value` never emits one.
    pub fn send_line(&self, value: &Value) -> Result<(), McpError> {
        let line = serde_json::to_string(value).map_err(|e| McpError::Protocol(e.to_string()))?;
        self.writer_tx
            .send(line)
            .map_err(|_| McpError::Transport("stdin writer closed".into()))
    }

    /// Close the child's stdin (EOF), wait up to [`SHUTDOWN_TIMEOUT`] for
    /// it to exit, then kill it. Idempotent — the second call observes no
    /// child and returns immediately.
    pub async fn close(&self) {
        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return;
        };
        drop(guard);

        self.reader_task.abort();
        self.writer_task.abort();

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) => debug!(?status, "MCP server exited"),
            Ok(Err(e)) => warn!("error waiting for MCP server to exit: {e}"),
            Err(_) => {
                warn!("MCP server did not exit within shutdown timeout, killing");
                let _ = child.start_kill();
                let _ = child.wait().await;
            }
        }
    }
}

async fn writer_loop(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(line) = rx.recv().await {
        trace!(%line, "-> mcp server");
        if stdin.write_all(line.as_bytes()).await.is_err() {
            break;
        }
        if stdin.write_all(b"\n").await.is_err() {
            break;
        }
        if stdin.flush().await.is_err() {
            break;
        }
    }
    let _ = stdin.shutdown().await;
}

async fn reader_loop(
    stdout: ChildStdout,
    message_tx: mpsc::UnboundedSender<Value>,
    diag_tx: mpsc::UnboundedSender<MalformedLine>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                trace!(%line, "<- mcp server");
                match serde_json::from_str::<Value>(&line) {
                    Ok(value) => {
                        if message_tx.send(value).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%line, %err, "malformed line from MCP server, dropping");
                        let _ = diag_tx.send(MalformedLine {
                            raw: line,
                            error: err.to_string(),
                        });
                    }
                }
            }
            Ok(None) => {
                debug!("MCP server closed stdout");
                break;
            }
            Err(err) => {
                warn!("error reading from MCP server stdout: {err}");
                break;
            }
        }
    }
    // Dropping the senders signals EOF/close to whoever owns the receivers.
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn script_config(body: &str) -> (tempfile::TempDir, ServerConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake_server.sh");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\n{body}").unwrap();
        drop(file);
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        let config = ServerConfig::new("/bin/sh")
            .with_args(["-c".to_string(), path.to_str().unwrap().to_string()]);
        (dir, config)
    }

    #[tokio::test]
    async fn yields_parsed_lines_and_reports_malformed_ones() {
        let (_dir, config) = script_config(
            r#"echo '{"jsonrpc":"2.0","id":"1","result":{}}'; echo 'not json'; sleep 5"#,
        );
        let (transport, mut messages, mut diagnostics) =
            FramedStdioTransport::spawn(&config).await.unwrap();

        let first = messages.recv().await.unwrap();
        assert_eq!(first["id"], "1");

        let bad = diagnostics.recv().await.unwrap();
        assert_eq!(bad.raw, "not json");

        transport.close().await;
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (_dir, config) = script_config("sleep 5");
        let (transport, _messages, _diag) = FramedStdioTransport::spawn(&config).await.unwrap();
        transport.close().await;
        transport.close().await;
    }

    #[tokio::test]
    async fn writes_round_trip_through_a_cat_server() {
        let (_dir, config) = script_config("cat");
        let (transport, mut messages, _diag) = FramedStdioTransport::spawn(&config).await.unwrap();

        transport
            .send_line(&serde_json::json!({"jsonrpc":"2.0","id":"echo-1","method":"ping"}))
            .unwrap();

        let echoed = messages.recv().await.unwrap();
        assert_eq!(echoed["id"], "echo-1");

        transport.close().await;
    }
}
