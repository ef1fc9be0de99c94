use clap::ValueEnum;

/// CLI-facing mirror of [`mcp_domain::config::OutputFormat`] — kept
/// separate so this crate's `clap::ValueEnum` impl doesn't leak into the
/// domain layer, which stays free of CLI-parsing dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl From<OutputFormat> for mcp_domain::config::OutputFormat {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Text => mcp_domain::config::OutputFormat::Text,
            OutputFormat::Json => mcp_domain::config::OutputFormat::Json,
        }
    }
}
