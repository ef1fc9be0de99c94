//! `mcp-cli` binary: parses arguments, wires the infrastructure adapters
//! into the application use cases, and dispatches to a subcommand.
//!
//! This is pure composition — no MCP or LLM logic lives here, only
//! dependency injection and argument-to-call translation per §6 of the
//! CLI surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use mcp_domain::{Conversation, Message, ServerLaunchDescriptor};
use mcp_infrastructure::{
    load_provider_config, load_server_launch_descriptor, ConnectionState, JsonlConversationLogger, ProviderRegistry,
    ToolManager,
};
use mcp_presentation::{Cli, Command, ConsoleFormatter, OutputFormat, PromptsCommand, ResourcesCommand, ServerStatus, ToolsCommand};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => Ok(()),
        Err(err) => {
            eprintln!("error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.format;
    let descriptor = load_descriptor(cli.config_file.as_deref())?;
    let manager = Arc::new(ToolManager::start(&descriptor).await);
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received, cancelling");
        signal_cancel.cancel();
    });

    let result = dispatch(&cli.command, &manager, format, cli.quiet, &cancel).await;

    tokio::select! {
        _ = manager.shutdown() => {}
        _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {
            info!("shutdown did not finish within the grace period");
        }
    }

    result
}

/// Resolves once either SIGINT or SIGTERM arrives, whichever first —
/// every subcommand's `cancel` token is wired to this, not just `chat`'s.
async fn wait_for_shutdown_signal() {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

/// Empty-but-valid descriptor when nothing is configured, so `servers`/
/// `tools list` on a freshly installed machine print an empty catalog
/// instead of failing outright.
fn load_descriptor(explicit: Option<&std::path::Path>) -> Result<ServerLaunchDescriptor> {
    match load_server_launch_descriptor(explicit) {
        Ok(descriptor) => Ok(descriptor),
        Err(mcp_infrastructure::config::ConfigLoadError::NotFound) => Ok(ServerLaunchDescriptor::default()),
        Err(err) => Err(err).context("loading server launch descriptor"),
    }
}

async fn dispatch(
    command: &Command,
    manager: &Arc<ToolManager>,
    format: OutputFormat,
    quiet: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Command::Servers => cmd_servers(manager, format).await,
        Command::Ping { server } => cmd_ping(manager, server, format).await,
        Command::Tools { command } => cmd_tools(manager, command, format).await,
        Command::Prompts { command } => cmd_prompts(manager, command, format).await,
        Command::Resources { command } => cmd_resources(manager, command, format).await,
        Command::Chat { prompt, provider, model, save, log_conversation } => {
            cmd_chat(
                manager,
                prompt,
                provider.as_deref(),
                model.as_deref(),
                save.as_deref(),
                log_conversation.as_deref(),
                quiet,
                cancel,
            )
            .await
        }
    }
}

async fn cmd_servers(manager: &ToolManager, format: OutputFormat) -> Result<()> {
    let mut statuses: Vec<ServerStatus> = Vec::new();
    for namespace in manager.connected_servers() {
        let Some(connection) = manager.connection(namespace) else { continue };
        let state = connection.state().await;
        let info = connection.server_info().await;
        let (ready, error) = match state {
            ConnectionState::Ready => (true, None),
            ConnectionState::Degraded => (false, Some("degraded: last health check failed".to_string())),
            ConnectionState::Closed => (false, Some("closed".to_string())),
            ConnectionState::New | ConnectionState::Handshaking => (false, Some("handshaking".to_string())),
        };
        statuses.push(ServerStatus { namespace: namespace.to_string(), ready, info, error });
    }
    for failure in manager.startup_errors() {
        statuses.push(ServerStatus {
            namespace: failure.namespace.clone(),
            ready: false,
            info: None,
            error: Some(failure.error.clone()),
        });
    }
    statuses.sort_by(|a, b| a.namespace.cmp(&b.namespace));

    print_output(format, &statuses, ConsoleFormatter::servers(&statuses));
    Ok(())
}

async fn cmd_ping(manager: &ToolManager, server: &str, format: OutputFormat) -> Result<()> {
    let alive = manager.ping(server).await.with_context(|| format!("no such server `{server}`"))?;
    print_output(format, &serde_json::json!({"server": server, "alive": alive}), ConsoleFormatter::ping(server, alive));
    if !alive {
        anyhow::bail!("{server} did not respond to ping");
    }
    Ok(())
}

async fn cmd_tools(manager: &ToolManager, command: &ToolsCommand, format: OutputFormat) -> Result<()> {
    match command {
        ToolsCommand::List => {
            let tools = manager.get_unique_tools();
            print_output(format, &tools, ConsoleFormatter::tools(&tools));
            Ok(())
        }
        ToolsCommand::Call { name, args, json } => {
            let arguments = parse_call_arguments(args, json.as_deref())?;
            let result = {
                use mcp_application::ports::tool_executor::ToolExecutorPort;
                manager.call_tool(name, arguments).await?
            };
            print_output(format, &result, ConsoleFormatter::tool_call_result(&result));
            if !result.success {
                anyhow::bail!("tool call failed: {}", result.error.as_deref().unwrap_or("unknown error"));
            }
            Ok(())
        }
    }
}

async fn cmd_prompts(manager: &ToolManager, command: &PromptsCommand, format: OutputFormat) -> Result<()> {
    match command {
        PromptsCommand::List { server } => {
            let prompts = manager.list_prompts(server).await.with_context(|| format!("no such server `{server}`"))?;
            print_output(format, &prompts, ConsoleFormatter::prompts(&prompts));
            Ok(())
        }
    }
}

async fn cmd_resources(manager: &ToolManager, command: &ResourcesCommand, format: OutputFormat) -> Result<()> {
    match command {
        ResourcesCommand::List { server } => {
            let resources = manager.list_resources(server).await.with_context(|| format!("no such server `{server}`"))?;
            print_output(format, &resources, ConsoleFormatter::resources(&resources));
            Ok(())
        }
    }
}

async fn cmd_chat(
    manager: &Arc<ToolManager>,
    prompt: &str,
    provider: Option<&str>,
    model: Option<&str>,
    save: Option<&std::path::Path>,
    log_conversation: Option<&std::path::Path>,
    quiet: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    let provider_config = load_provider_config(None).context("loading provider config")?;
    let registry = ProviderRegistry::new(provider_config);
    let llm = registry.build(provider, model).context("resolving LLM provider")?;

    if !quiet {
        println!("model: {}", llm.model());
    }

    let mut orchestrator = mcp_application::ChatOrchestrator::new(llm, manager.clone());
    if let Some(path) = log_conversation {
        if let Some(logger) = JsonlConversationLogger::new(path) {
            orchestrator = orchestrator.with_conversation_logger(Arc::new(logger));
        }
    }

    let mut conversation = Conversation::new();
    conversation.push(Message::user(prompt));

    // `cancel` is already wired to SIGINT/SIGTERM in `run()`; `run_turn`
    // checks it between iterations and tool calls.
    orchestrator.run_turn(&mut conversation, cancel).await;

    print_output(OutputFormat::Text, &conversation.messages, ConsoleFormatter::transcript(&conversation));

    if let Some(path) = save {
        save_conversation(&conversation, path)?;
    }

    Ok(())
}

fn save_conversation(conversation: &Conversation, path: &std::path::Path) -> Result<()> {
    let is_markdown = path.extension().and_then(|e| e.to_str()) == Some("md");
    let contents = if is_markdown {
        conversation.export_markdown()
    } else {
        conversation.export_json().context("serializing conversation")?
    };
    std::fs::write(path, contents).with_context(|| format!("writing transcript to {}", path.display()))?;
    Ok(())
}

/// Build the JSON arguments object for `tools call`: `--json` wins
/// outright; otherwise each `--arg key=value` is parsed as JSON when
/// possible, falling back to a plain string.
fn parse_call_arguments(args: &[String], json: Option<&str>) -> Result<serde_json::Value> {
    if let Some(raw) = json {
        return serde_json::from_str(raw).context("parsing --json argument");
    }

    let mut object = serde_json::Map::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .with_context(|| format!("--arg `{arg}` is not in key=value form"))?;
        let parsed = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        object.insert(key.to_string(), parsed);
    }
    Ok(serde_json::Value::Object(object))
}

fn print_output<T: serde::Serialize>(format: OutputFormat, json_value: &T, text: String) {
    match format {
        OutputFormat::Json => {
            let rendered = serde_json::to_string_pretty(json_value).unwrap_or_else(|_| "null".to_string());
            println!("{rendered}");
        }
        OutputFormat::Text => print!("{text}"),
    }
}
