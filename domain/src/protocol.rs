//! JSON-RPC wire types spoken between this client and each MCP server.
//!
//! Messages are framed one-per-line (see the transport crate); this module
//! only defines their JSON shape. Request IDs are strings, unique per
//! session for the session's lifetime — never reused, even across retries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic per-process counter backing [`RequestId::generate`].
static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// A JSON-RPC request, always answered exactly once (or timed out).
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl Request {
    pub fn new(id: impl Into<String>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Allocate a fresh, process-unique request id.
    ///
    /// Formatted as `req-<n>` so it is never mistaken for a server-issued
    /// identifier or for a tool call id coming back from an LLM.
    pub fn generate_id() -> String {
        format!("req-{}", NEXT_REQUEST_ID.fetch_add(1, Ordering::SeqCst))
    }
}

/// A JSON-RPC response. Exactly one of `result`/`error` is populated.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    #[allow(dead_code)]
    pub jsonrpc: Option<String>,
    pub id: String,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
}

/// A JSON-RPC error object as carried inside a [`Response`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC notification: no `id`, never acknowledged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// The three shapes a decoded line can take.
///
/// Classification is purely structural: a message with `id` and no
/// `method` is a [`Response`]; a message with both is an incoming request
/// from the server (none of the methods this client implements currently
/// accept one, but the shape is still classified so malformed traffic is
/// diagnosable); a message with neither, or with `method` and no `id`, is
/// a [`Notification`].
#[derive(Debug, Clone)]
pub enum Message {
    Response(Response),
    IncomingRequest { id: String, method: String, params: Option<Value> },
    Notification(Notification),
}

/// Classify a parsed JSON value into one of the three message shapes.
///
/// A message with an `id` but no `method` is a response even if it lacks
/// both `result` and `error` — such a message is malformed, but the
/// caller needs to see it was *addressed* as a response to route the
/// parse failure back to the right pending entry rather than dropping it
/// as an unmatched notification.
pub fn classify_message(value: &Value) -> Message {
    let id = value.get("id").and_then(|v| id_as_string(v));
    let method = value
        .get("method")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    match (id, method) {
        (Some(id), Some(method)) => Message::IncomingRequest {
            id,
            method,
            params: value.get("params").cloned(),
        },
        (Some(_), None) => match serde_json::from_value::<Response>(value.clone()) {
            Ok(resp) => Message::Response(resp),
            Err(_) => Message::Notification(Notification {
                jsonrpc: "2.0".to_string(),
                method: String::new(),
                params: None,
            }),
        },
        (None, Some(method)) => Message::Notification(Notification {
            jsonrpc: "2.0".to_string(),
            method,
            params: value.get("params").cloned(),
        }),
        (None, None) => Message::Notification(Notification {
            jsonrpc: "2.0".to_string(),
            method: String::new(),
            params: None,
        }),
    }
}

fn id_as_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classifies_response() {
        let v = json!({"jsonrpc":"2.0","id":"req-1","result":{"ok":true}});
        match classify_message(&v) {
            Message::Response(r) => {
                assert_eq!(r.id, "req-1");
                assert!(r.error.is_none());
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_error_response() {
        let v = json!({"jsonrpc":"2.0","id":"req-2","error":{"code":-32601,"message":"nope"}});
        match classify_message(&v) {
            Message::Response(r) => {
                assert_eq!(r.error.unwrap().code, -32601);
            }
            other => panic!("expected Response, got {other:?}"),
        }
    }

    #[test]
    fn classifies_incoming_request() {
        let v = json!({"jsonrpc":"2.0","id":"5","method":"sample/elicit","params":{}});
        match classify_message(&v) {
            Message::IncomingRequest { id, method, .. } => {
                assert_eq!(id, "5");
                assert_eq!(method, "sample/elicit");
            }
            other => panic!("expected IncomingRequest, got {other:?}"),
        }
    }

    #[test]
    fn classifies_notification() {
        let v = json!({"jsonrpc":"2.0","method":"notifications/tools/list_changed"});
        match classify_message(&v) {
            Message::Notification(n) => assert_eq!(n.method, "notifications/tools/list_changed"),
            other => panic!("expected Notification, got {other:?}"),
        }
    }

    #[test]
    fn neither_id_nor_method_is_a_notification() {
        let v = json!({"jsonrpc":"2.0"});
        match classify_message(&v) {
            Message::Notification(n) => assert!(n.method.is_empty()),
            other => panic!("expected Notification, got {other:?}"),
        }
    }

    #[test]
    fn request_ids_are_unique_and_monotonic() {
        let a = Request::generate_id();
        let b = Request::generate_id();
        assert_ne!(a, b);
    }
}
