//! An OpenAI-compatible chat-completions adapter.

use async_trait::async_trait;
use mcp_application::ports::llm::{CompletionResult, GatewayError, LlmProvider, ToolCallRequest, ToolDeclaration};
use mcp_domain::{Message, Role};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiCompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatibleProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    pub fn openai(api_key: String, model: impl Into<String>) -> Self {
        Self::new(DEFAULT_BASE_URL, Some(api_key), model)
    }

    fn build_request(&self, messages: &[Message], tools: &[ToolDeclaration]) -> Value {
        let chat_messages: Vec<Value> = messages.iter().map(convert_message).collect();

        let mut request = serde_json::json!({
            "model": self.model,
            "messages": chat_messages,
        });

        if !tools.is_empty() {
            let chat_tools: Vec<Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            request["tools"] = Value::Array(chat_tools);
        }

        request
    }
}

fn convert_message(message: &Message) -> Value {
    match message.role {
        Role::System => serde_json::json!({"role": "system", "content": message.content}),
        Role::User => serde_json::json!({"role": "user", "content": message.content}),
        Role::Assistant if !message.tool_calls.is_empty() => {
            let tool_calls: Vec<Value> = message
                .tool_calls
                .iter()
                .map(|stub| {
                    serde_json::json!({
                        "id": stub.id,
                        "type": "function",
                        "function": {"name": stub.name, "arguments": stub.arguments},
                    })
                })
                .collect();
            serde_json::json!({"role": "assistant", "content": Value::Null, "tool_calls": tool_calls})
        }
        Role::Assistant => serde_json::json!({"role": "assistant", "content": message.content}),
        Role::Tool => serde_json::json!({
            "role": "tool",
            "tool_call_id": message.tool_call_id,
            "content": message.content,
        }),
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn create_completion(
        &self,
        messages: &[Message],
        tools: &[ToolDeclaration],
    ) -> Result<CompletionResult, GatewayError> {
        let body = self.build_request(messages, tools);

        debug!(model = %self.model, base_url = %self.base_url, "requesting completion");

        let mut request = self.client.post(&self.base_url).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Connection(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GatewayError::RequestFailed("rate limited".into()));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, "provider returned an error");
            return Err(GatewayError::RequestFailed(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::RequestFailed(e.to_string()))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::RequestFailed("no choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                arguments: Value::String(tc.function.arguments),
            })
            .collect();

        Ok(CompletionResult {
            response: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    id: String,
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCall {
    name: String,
    arguments: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_and_user_messages_convert_plainly() {
        let v = convert_message(&Message::system("be helpful"));
        assert_eq!(v["role"], "system");
        assert_eq!(v["content"], "be helpful");
    }

    #[test]
    fn assistant_tool_call_carries_function_shape() {
        let stub = mcp_domain::ToolCallStub { id: "c1".into(), name: "echo".into(), arguments: "{}".into() };
        let v = convert_message(&Message::assistant_tool_call(stub));
        assert_eq!(v["tool_calls"][0]["function"]["name"], "echo");
        assert!(v["content"].is_null());
    }

    #[test]
    fn tool_result_carries_call_id() {
        let v = convert_message(&Message::tool_result("c1", "echo", "ok"));
        assert_eq!(v["role"], "tool");
        assert_eq!(v["tool_call_id"], "c1");
    }

    #[test]
    fn build_request_includes_tools_when_present() {
        let provider = OpenAiCompatibleProvider::new("http://localhost:11434/v1/chat/completions", None, "llama3");
        let tools = vec![ToolDeclaration {
            name: "echo".into(),
            description: "echoes".into(),
            parameters: serde_json::json!({"type":"object","properties":{}}),
        }];
        let body = provider.build_request(&[Message::user("hi")], &tools);
        assert_eq!(body["model"], "llama3");
        assert_eq!(body["tools"][0]["function"]["name"], "echo");
    }
}
