//! Loads the `{"mcpServers": {...}}` launch descriptor.
//!
//! Resolution order: an explicit `--config-file` path, then
//! `./server_config.json` in the current directory, then
//! `~/.mcp-cli/server_config.json`.

use std::path::{Path, PathBuf};

use mcp_domain::ServerLaunchDescriptor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("no server launch descriptor found (looked for --config-file, ./server_config.json, ~/.mcp-cli/server_config.json)")]
    NotFound,

    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

/// Resolve the launch descriptor path without reading it, so callers can
/// report which file they're about to load.
pub fn resolve_server_launch_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    let cwd_default = PathBuf::from("server_config.json");
    if cwd_default.exists() {
        return Some(cwd_default);
    }

    dirs::home_dir().map(|home| home.join(".mcp-cli").join("server_config.json"))
}

pub fn load_server_launch_descriptor(
    explicit: Option<&Path>,
) -> Result<ServerLaunchDescriptor, ConfigLoadError> {
    let path = resolve_server_launch_path(explicit).ok_or(ConfigLoadError::NotFound)?;
    if !path.exists() {
        return Err(ConfigLoadError::NotFound);
    }

    let contents = std::fs::read_to_string(&path)
        .map_err(|source| ConfigLoadError::Io { path: path.clone(), source })?;
    serde_json::from_str(&contents).map_err(|source| ConfigLoadError::Parse { path, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_valid_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_config.json");
        std::fs::write(&path, r#"{"mcpServers":{"fs":{"command":"mcp-fs","args":["--root","/tmp"]}}}"#).unwrap();

        let descriptor = load_server_launch_descriptor(Some(&path)).unwrap();
        assert_eq!(descriptor.mcp_servers.get("fs").unwrap().command, "mcp-fs");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = load_server_launch_descriptor(Some(Path::new("/nonexistent/server_config.json")));
        assert!(matches!(err, Err(ConfigLoadError::NotFound)));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("server_config.json");
        std::fs::write(&path, "not json").unwrap();

        let err = load_server_launch_descriptor(Some(&path));
        assert!(matches!(err, Err(ConfigLoadError::Parse { .. })));
    }
}
