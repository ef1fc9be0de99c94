//! CLI argument surface for mcp-cli.
//!
//! Covers the non-interactive surface only — `chat` is a single
//! prompt-in, transcript-out command, not a REPL; there is no line
//! editor or slash-command dispatcher here.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "mcp-cli")]
#[command(author, version, about = "Command-line client for the Model Context Protocol")]
#[command(long_about = r#"
mcp-cli launches one or more MCP servers as subprocesses, aggregates their
tools/prompts/resources into a single namespace, and either lets you
inspect that namespace directly or drives an LLM through a tool-using
chat turn.

Examples:
  mcp-cli servers
  mcp-cli tools list
  mcp-cli tools call filesystem.read_file --arg path=/tmp/notes.txt
  mcp-cli chat "What files are in /tmp?"
"#)]
pub struct Cli {
    /// Path to the server launch descriptor (defaults to ./server_config.json,
    /// falling back to ~/.mcp-cli/server_config.json).
    #[arg(long, global = true, value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress startup/progress messages.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every configured server and whether it connected.
    Servers,

    /// Liveness-check one connected server.
    Ping {
        server: String,
    },

    /// Work with the aggregated tool catalog.
    Tools {
        #[command(subcommand)]
        command: ToolsCommand,
    },

    /// Work with prompt templates.
    Prompts {
        #[command(subcommand)]
        command: PromptsCommand,
    },

    /// Work with resources.
    Resources {
        #[command(subcommand)]
        command: ResourcesCommand,
    },

    /// Send one message to the LLM and run the tool-calling loop to
    /// completion, printing the resulting transcript.
    Chat {
        /// The user message to send.
        prompt: String,

        /// Provider name from providers.json (defaults to its default_provider).
        #[arg(long)]
        provider: Option<String>,

        /// Model name (defaults to the provider's default_model).
        #[arg(long)]
        model: Option<String>,

        /// Write the full transcript to this path (.json or .md by extension).
        #[arg(long, value_name = "PATH")]
        save: Option<PathBuf>,

        /// Append a structured JSONL log of every LLM response and tool
        /// call to this path, separate from the human-facing transcript.
        #[arg(long, value_name = "PATH")]
        log_conversation: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ToolsCommand {
    /// List every tool across every connected server.
    List,

    /// Call a tool by fully-qualified name, LLM-safe alias, or bare name.
    Call {
        name: String,

        /// A `key=value` argument; repeat for multiple. Values are parsed
        /// as JSON when possible, otherwise kept as strings.
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,

        /// A full JSON object of arguments, overriding --arg.
        #[arg(long)]
        json: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum PromptsCommand {
    /// List prompts advertised by a server.
    List {
        server: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ResourcesCommand {
    /// List resources advertised by a server.
    List {
        server: String,
    },
}
