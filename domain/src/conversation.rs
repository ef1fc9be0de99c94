//! Conversation history types shared between the chat orchestrator and the
//! LLM provider port.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A pending tool invocation emitted by the model, carried on an
/// `assistant` record until the matching `tool` record closes it out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallStub {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// One entry in a conversation's append-only log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallStub>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    /// An assistant record carrying a pending tool call stub (no visible
    /// content of its own).
    pub fn assistant_tool_call(stub: ToolCallStub) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: vec![stub],
            tool_call_id: None,
            name: None,
        }
    }

    /// A `tool` record closing out the call identified by `tool_call_id`.
    pub fn tool_result(tool_call_id: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(tool_call_id.into()),
            name: Some(name.into()),
        }
    }
}

/// An ordered conversation log plus the export helpers used by the `chat`
/// CLI command's `--save` flag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Conversation {
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Every `tool` record has a `tool_call_id` matching an earlier
    /// assistant tool-call stub. Used by tests and by the orchestrator's
    /// own sanity checks after a turn completes.
    pub fn is_well_formed(&self) -> bool {
        let mut seen_ids = std::collections::HashSet::new();
        for message in &self.messages {
            for stub in &message.tool_calls {
                seen_ids.insert(stub.id.clone());
            }
            if message.role == Role::Tool {
                match &message.tool_call_id {
                    Some(id) if seen_ids.contains(id) => {}
                    _ => return false,
                }
            }
        }
        true
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.messages)
    }

    pub fn export_markdown(&self) -> String {
        let mut out = String::new();
        for message in &self.messages {
            match message.role {
                Role::System => out.push_str(&format!("**system**: {}\n\n", message.content)),
                Role::User => out.push_str(&format!("**user**: {}\n\n", message.content)),
                Role::Assistant if !message.tool_calls.is_empty() => {
                    for call in &message.tool_calls {
                        out.push_str(&format!(
                            "**assistant** called `{}` with `{}`\n\n",
                            call.name, call.arguments
                        ));
                    }
                }
                Role::Assistant => out.push_str(&format!("**assistant**: {}\n\n", message.content)),
                Role::Tool => out.push_str(&format!(
                    "**tool** ({}): {}\n\n",
                    message.name.as_deref().unwrap_or("?"),
                    message.content
                )),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_when_every_tool_record_matches_a_stub() {
        let mut convo = Conversation::new();
        convo.push(Message::user("hi"));
        convo.push(Message::assistant_tool_call(ToolCallStub {
            id: "c1".into(),
            name: "ns_echo".into(),
            arguments: "{}".into(),
        }));
        convo.push(Message::tool_result("c1", "ns.echo", "{}"));
        assert!(convo.is_well_formed());
    }

    #[test]
    fn not_well_formed_when_tool_record_has_no_matching_stub() {
        let mut convo = Conversation::new();
        convo.push(Message::tool_result("orphan", "ns.echo", "{}"));
        assert!(!convo.is_well_formed());
    }

    #[test]
    fn export_markdown_renders_tool_calls() {
        let mut convo = Conversation::new();
        convo.push(Message::assistant_tool_call(ToolCallStub {
            id: "c1".into(),
            name: "echo".into(),
            arguments: "{}".into(),
        }));
        let md = convo.export_markdown();
        assert!(md.contains("called `echo`"));
    }
}
