//! Provider configuration types (provider-neutral, serde-free).
//!
//! Adapted from a richer per-provider-struct config: this client treats
//! every provider the same way (name, api key resolution, base URL,
//! default model), so one [`ProviderEntry`] shape covers Anthropic,
//! OpenAI, Groq, Ollama and friends.

use std::collections::HashMap;

/// The resolved provider configuration file: one entry per provider name,
/// plus which provider/model to use when the CLI doesn't name one.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub default_provider: Option<String>,
    pub providers: HashMap<String, ProviderEntry>,
}

impl ProviderConfig {
    pub fn get(&self, name: &str) -> Option<&ProviderEntry> {
        self.providers.get(name)
    }

    /// The entry to use when the CLI was not given an explicit `--provider`.
    pub fn default_entry(&self) -> Option<&ProviderEntry> {
        self.default_provider.as_deref().and_then(|name| self.get(name))
    }
}

/// Settings for a single LLM provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderEntry {
    /// Environment variable to read the API key from, if `api_key` is unset.
    pub api_key_env: Option<String>,
    /// An explicit API key, takes priority over `api_key_env`.
    pub api_key: Option<String>,
    /// Base URL for the provider's API, if not the provider's default.
    pub api_base: Option<String>,
    /// Model to use when the CLI doesn't name one.
    pub default_model: Option<String>,
}

impl ProviderEntry {
    /// Resolve the API key: explicit value, then environment variable
    /// named by `api_key_env`, then none.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_wins_over_env() {
        let entry = ProviderEntry {
            api_key_env: Some("MCP_CLI_TEST_NONEXISTENT_VAR".into()),
            api_key: Some("explicit-key".into()),
            api_base: None,
            default_model: None,
        };
        assert_eq!(entry.resolve_api_key(), Some("explicit-key".to_string()));
    }

    #[test]
    fn falls_back_to_env_var() {
        std::env::set_var("MCP_CLI_TEST_API_KEY", "from-env");
        let entry = ProviderEntry {
            api_key_env: Some("MCP_CLI_TEST_API_KEY".into()),
            api_key: None,
            api_base: None,
            default_model: None,
        };
        assert_eq!(entry.resolve_api_key(), Some("from-env".to_string()));
        std::env::remove_var("MCP_CLI_TEST_API_KEY");
    }

    #[test]
    fn none_when_neither_set() {
        let entry = ProviderEntry::default();
        assert_eq!(entry.resolve_api_key(), None);
    }

    #[test]
    fn default_entry_looks_up_default_provider() {
        let mut providers = HashMap::new();
        providers.insert(
            "anthropic".to_string(),
            ProviderEntry {
                default_model: Some("claude".into()),
                ..Default::default()
            },
        );
        let config = ProviderConfig {
            default_provider: Some("anthropic".into()),
            providers,
        };
        assert_eq!(
            config.default_entry().unwrap().default_model.as_deref(),
            Some("claude")
        );
    }
}
