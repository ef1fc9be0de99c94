//! The chat orchestrator: the model <-> tools loop.
//!
//! Drives one user turn to completion by alternating LLM completions
//! with tool dispatch through the [`ToolExecutorPort`], until the model
//! replies without requesting any more tools, the iteration budget is
//! exhausted, or the caller cancels.

use std::sync::Arc;

use mcp_domain::{Conversation, Message, NamespacedTool, ToolCallStub};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::ports::{
    conversation_logger::{ConversationEvent, ConversationLogger, NoConversationLogger},
    llm::LlmProvider,
    tool_executor::ToolExecutorPort,
    tool_schema::{DefaultToolSchema, ToolSchemaPort},
};

/// Hard cap on tool-use iterations within a single user turn.
///
/// Bounds runaway loops where the model keeps requesting tools without
/// ever producing a final answer.
const MAX_ITERATIONS: usize = 10;

pub struct ChatOrchestrator {
    llm: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolExecutorPort>,
    schema: Box<dyn ToolSchemaPort>,
    conversation_logger: Arc<dyn ConversationLogger>,
}

impl ChatOrchestrator {
    pub fn new(llm: Arc<dyn LlmProvider>, tools: Arc<dyn ToolExecutorPort>) -> Self {
        Self {
            llm,
            tools,
            schema: Box::new(DefaultToolSchema),
            conversation_logger: Arc::new(NoConversationLogger),
        }
    }

    /// Attach a structured conversation logger, e.g. a
    /// `JsonlConversationLogger` writing to the `--save`d transcript path.
    pub fn with_conversation_logger(mut self, logger: Arc<dyn ConversationLogger>) -> Self {
        self.conversation_logger = logger;
        self
    }

    /// Run one user turn to completion, appending every intermediate
    /// record to `conversation` as it happens.
    pub async fn run_turn(&self, conversation: &mut Conversation, cancel: &CancellationToken) {
        for _ in 0..MAX_ITERATIONS {
            if cancel.is_cancelled() {
                conversation.push(Message::tool_result(
                    "cancelled",
                    "cancelled",
                    "the turn was cancelled",
                ));
                return;
            }

            let catalog = self.tools.list_tools();
            let declarations = self.schema.to_declarations(&catalog);

            let completion = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    conversation.push(Message::assistant("cancelled"));
                    return;
                }
                result = self.llm.create_completion(&conversation.messages, &declarations) => result,
            };

            let completion = match completion {
                Ok(c) => c,
                Err(err) => {
                    conversation.push(Message::assistant(format!("error: {err}")));
                    return;
                }
            };

            self.conversation_logger.log(ConversationEvent::new(
                "llm_response",
                serde_json::json!({
                    "model": self.llm.model(),
                    "bytes": completion.response.len(),
                    "tool_calls": completion.tool_calls.len(),
                }),
            ));

            if completion.tool_calls.is_empty() {
                conversation.push(Message::assistant(completion.response));
                return;
            }

            for call in completion.tool_calls {
                conversation.push(Message::assistant_tool_call(ToolCallStub {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.to_string(),
                }));

                let arguments = match normalize_arguments(&call.arguments) {
                    Ok(v) => v,
                    Err(()) => {
                        conversation.push(Message::tool_result(
                            call.id.clone(),
                            call.name.clone(),
                            "error: invalid arguments",
                        ));
                        continue;
                    }
                };

                if cancel.is_cancelled() {
                    conversation.push(Message::tool_result(
                        call.id,
                        call.name,
                        "error: cancelled",
                    ));
                    return;
                }

                self.conversation_logger.log(ConversationEvent::new(
                    "tool_call",
                    serde_json::json!({"tool": call.name, "arguments": arguments}),
                ));

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        conversation.push(Message::tool_result(call.id.clone(), call.name.clone(), "error: cancelled"));
                        return;
                    }
                    result = self.tools.call_tool(&call.name, arguments) => result,
                };

                let content = match outcome {
                    Ok(result) => result.as_content(),
                    Err(err) => format!("error: {err}"),
                };
                conversation.push(Message::tool_result(call.id, call.name, content));
            }
        }

        conversation.push(Message::assistant("tool-call budget exhausted"));
    }

    /// The aggregated catalog, for callers that just want to display it
    /// (e.g. the `tools list` CLI command).
    pub fn catalog(&self) -> Vec<NamespacedTool> {
        self.tools.list_tools()
    }
}

/// The model may deliver tool-call arguments as either a JSON string or
/// an object; normalize both to an object value.
fn normalize_arguments(raw: &Value) -> Result<Value, ()> {
    match raw {
        Value::String(s) => {
            if s.trim().is_empty() {
                Ok(Value::Object(Default::default()))
            } else {
                serde_json::from_str(s).map_err(|_| ())
            }
        }
        Value::Object(_) => Ok(raw.clone()),
        Value::Null => Ok(Value::Object(Default::default())),
        _ => Err(()),
    }
}
