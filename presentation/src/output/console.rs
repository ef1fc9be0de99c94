//! Text-mode rendering of tool catalogs, server status, and chat
//! transcripts.

use colored::Colorize;
use mcp_domain::{Conversation, NamespacedTool, PromptDescriptor, ResourceDescriptor, Role, ToolCallResult};

use crate::output::status::ServerStatus;

/// Renders domain values as the human-facing text the non-`--format json`
/// path of every subcommand prints.
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    pub fn servers(statuses: &[ServerStatus]) -> String {
        let mut out = String::new();
        for status in statuses {
            if status.ready {
                let info = status.info.as_ref();
                out.push_str(&format!(
                    "{} {}  {}\n",
                    "*".green().bold(),
                    status.namespace.bold(),
                    info.map(|i| format!("({} {})", i.name, i.version)).unwrap_or_default().dimmed()
                ));
            } else {
                out.push_str(&format!(
                    "{} {}  {}\n",
                    "x".red().bold(),
                    status.namespace.bold(),
                    status.error.as_deref().unwrap_or("failed to start").red()
                ));
            }
        }
        out
    }

    pub fn tools(tools: &[NamespacedTool]) -> String {
        if tools.is_empty() {
            return "(no tools available)\n".dimmed().to_string();
        }
        let mut out = String::new();
        for tool in tools {
            out.push_str(&format!(
                "{}  {}\n",
                tool.qualified_name().cyan().bold(),
                tool.tool.description
            ));
        }
        out
    }

    pub fn prompts(prompts: &[PromptDescriptor]) -> String {
        if prompts.is_empty() {
            return "(no prompts available)\n".dimmed().to_string();
        }
        let mut out = String::new();
        for prompt in prompts {
            out.push_str(&format!(
                "{}  {}\n",
                prompt.name.cyan().bold(),
                prompt.description.as_deref().unwrap_or("")
            ));
        }
        out
    }

    pub fn resources(resources: &[ResourceDescriptor]) -> String {
        if resources.is_empty() {
            return "(no resources available)\n".dimmed().to_string();
        }
        let mut out = String::new();
        for resource in resources {
            out.push_str(&format!(
                "{}  {}\n",
                resource.uri.cyan().bold(),
                resource.name
            ));
        }
        out
    }

    pub fn tool_call_result(result: &ToolCallResult) -> String {
        if result.success {
            format!(
                "{} {} ({}ms)\n{}\n",
                "ok".green().bold(),
                result.tool_name,
                result.execution_time_ms,
                result.result.as_ref().map(|v| v.to_string()).unwrap_or_default()
            )
        } else {
            format!(
                "{} {} ({}ms)\n{}\n",
                "error".red().bold(),
                result.tool_name,
                result.execution_time_ms,
                result.error.as_deref().unwrap_or("unknown error").red()
            )
        }
    }

    pub fn ping(namespace: &str, alive: bool) -> String {
        if alive {
            format!("{} {} is alive\n", "*".green().bold(), namespace.bold())
        } else {
            format!("{} {} did not respond\n", "x".red().bold(), namespace.bold())
        }
    }

    /// Render a completed chat turn: every record after the leading
    /// `user` message, in the order it was appended.
    pub fn transcript(conversation: &Conversation) -> String {
        let mut out = String::new();
        for message in &conversation.messages {
            match message.role {
                Role::System => {}
                Role::User => out.push_str(&format!("{} {}\n", "you:".bold(), message.content)),
                Role::Assistant if !message.tool_calls.is_empty() => {
                    for call in &message.tool_calls {
                        out.push_str(&format!(
                            "{} calling {} with {}\n",
                            "assistant:".yellow().bold(),
                            call.name.cyan(),
                            call.arguments
                        ));
                    }
                }
                Role::Assistant => out.push_str(&format!("{} {}\n", "assistant:".yellow().bold(), message.content)),
                Role::Tool => out.push_str(&format!(
                    "{} ({}) {}\n",
                    "tool:".dimmed(),
                    message.name.as_deref().unwrap_or("?"),
                    message.content
                )),
            }
        }
        out
    }
}
