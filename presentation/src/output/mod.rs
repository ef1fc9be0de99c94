//! Output formatting: text (human-facing) or JSON, selected by `--format`.

mod console;
mod format;
mod status;

pub use console::ConsoleFormatter;
pub use format::OutputFormat;
pub use status::ServerStatus;
