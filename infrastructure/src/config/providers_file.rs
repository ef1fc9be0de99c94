//! Loads `~/.mcp-cli/providers.json`, translating its serde-friendly shape
//! into the serde-free [`ProviderConfig`] domain type.

use std::collections::HashMap;
use std::path::PathBuf;

use mcp_domain::{ProviderConfig, ProviderEntry};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderConfigLoadError {
    #[error("failed to read {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("failed to parse {path}: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Deserialize)]
struct ProviderConfigFile {
    #[serde(default)]
    default_provider: Option<String>,
    #[serde(default)]
    providers: HashMap<String, ProviderEntryFile>,
}

#[derive(Deserialize, Default)]
struct ProviderEntryFile {
    #[serde(default)]
    api_key_env: Option<String>,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    api_base: Option<String>,
    #[serde(default)]
    default_model: Option<String>,
}

impl From<ProviderEntryFile> for ProviderEntry {
    fn from(file: ProviderEntryFile) -> Self {
        ProviderEntry {
            api_key_env: file.api_key_env,
            api_key: file.api_key,
            api_base: file.api_base,
            default_model: file.default_model,
        }
    }
}

pub fn resolve_provider_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mcp-cli").join("providers.json"))
}

/// Returns an empty [`ProviderConfig`] when no file is found — provider
/// configuration is optional, since a provider's API key can be supplied
/// entirely through the CLI/environment instead.
pub fn load_provider_config(explicit: Option<&std::path::Path>) -> Result<ProviderConfig, ProviderConfigLoadError> {
    let path = explicit.map(|p| p.to_path_buf()).or_else(resolve_provider_config_path);
    let Some(path) = path else { return Ok(ProviderConfig::default()) };
    if !path.exists() {
        return Ok(ProviderConfig::default());
    }

    let contents = std::fs::read_to_string(&path)
        .map_err(|source| ProviderConfigLoadError::Io { path: path.clone(), source })?;
    let file: ProviderConfigFile =
        serde_json::from_str(&contents).map_err(|source| ProviderConfigLoadError::Parse { path, source })?;

    Ok(ProviderConfig {
        default_provider: file.default_provider,
        providers: file.providers.into_iter().map(|(k, v)| (k, v.into())).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_and_translates_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("providers.json");
        std::fs::write(
            &path,
            r#"{"default_provider":"openai","providers":{"openai":{"api_key_env":"OPENAI_API_KEY","default_model":"gpt-4o"}}}"#,
        )
        .unwrap();

        let config = load_provider_config(Some(&path)).unwrap();
        assert_eq!(config.default_provider.as_deref(), Some("openai"));
        let entry = config.get("openai").unwrap();
        assert_eq!(entry.default_model.as_deref(), Some("gpt-4o"));
    }

    #[test]
    fn missing_file_yields_empty_config() {
        let config = load_provider_config(Some(std::path::Path::new("/nonexistent/providers.json"))).unwrap();
        assert!(config.providers.is_empty());
    }
}
