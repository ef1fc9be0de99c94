//! Resolves a `--provider`/`--model` CLI selection against a loaded
//! [`ProviderConfig`] into a ready-to-use [`LlmProvider`].

use std::sync::Arc;

use mcp_application::ports::llm::LlmProvider;
use mcp_domain::ProviderConfig;
use thiserror::Error;

use super::OpenAiCompatibleProvider;

#[derive(Error, Debug)]
pub enum ProviderRegistryError {
    #[error("no provider configured and none named on the command line")]
    NoDefaultProvider,

    #[error("unknown provider `{0}`")]
    UnknownProvider(String),

    #[error("provider `{provider}` has no API key (set it in providers.json or via its env var)")]
    MissingApiKey { provider: String },

    #[error("no model given and provider `{provider}` has no default_model configured")]
    NoModel { provider: String },
}

/// Builds an [`LlmProvider`] from the loaded [`ProviderConfig`] plus
/// whatever the CLI overrode.
pub struct ProviderRegistry {
    config: ProviderConfig,
}

impl ProviderRegistry {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    /// Build a provider for `provider_name` (or the configured default)
    /// and `model` (or the provider's `default_model`).
    pub fn build(
        &self,
        provider_name: Option<&str>,
        model: Option<&str>,
    ) -> Result<Arc<dyn LlmProvider>, ProviderRegistryError> {
        let (name, entry) = match provider_name {
            Some(name) => (
                name.to_string(),
                self.config.get(name).ok_or_else(|| ProviderRegistryError::UnknownProvider(name.to_string()))?,
            ),
            None => {
                let name = self.config.default_provider.clone().ok_or(ProviderRegistryError::NoDefaultProvider)?;
                let entry = self.config.default_entry().ok_or(ProviderRegistryError::NoDefaultProvider)?;
                (name, entry)
            }
        };

        let api_key = entry.resolve_api_key();
        if api_key.is_none() && !is_local_base(entry.api_base.as_deref()) {
            return Err(ProviderRegistryError::MissingApiKey { provider: name });
        }

        let model = model
            .map(str::to_string)
            .or_else(|| entry.default_model.clone())
            .ok_or(ProviderRegistryError::NoModel { provider: name.clone() })?;

        let base_url = entry
            .api_base
            .clone()
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());

        Ok(Arc::new(OpenAiCompatibleProvider::new(base_url, api_key, model)))
    }
}

fn is_local_base(base: Option<&str>) -> bool {
    base.map(|b| b.contains("localhost") || b.contains("127.0.0.1")).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp_domain::ProviderEntry;
    use std::collections::HashMap;

    fn config_with(name: &str, entry: ProviderEntry) -> ProviderConfig {
        let mut providers = HashMap::new();
        providers.insert(name.to_string(), entry);
        ProviderConfig { default_provider: Some(name.to_string()), providers }
    }

    #[test]
    fn builds_default_provider_with_its_default_model() {
        let config = config_with(
            "openai",
            ProviderEntry { api_key: Some("k".into()), default_model: Some("gpt-4o".into()), ..Default::default() },
        );
        let registry = ProviderRegistry::new(config);
        let provider = registry.build(None, None).unwrap();
        assert_eq!(provider.model(), "gpt-4o");
    }

    #[test]
    fn missing_api_key_for_remote_provider_is_an_error() {
        let config = config_with("openai", ProviderEntry { default_model: Some("gpt-4o".into()), ..Default::default() });
        let registry = ProviderRegistry::new(config);
        let err = registry.build(None, None).unwrap_err();
        assert!(matches!(err, ProviderRegistryError::MissingApiKey { .. }));
    }

    #[test]
    fn local_endpoint_does_not_require_an_api_key() {
        let config = config_with(
            "ollama",
            ProviderEntry {
                api_base: Some("http://localhost:11434/v1/chat/completions".into()),
                default_model: Some("llama3".into()),
                ..Default::default()
            },
        );
        let registry = ProviderRegistry::new(config);
        assert!(registry.build(None, None).is_ok());
    }

    #[test]
    fn unknown_provider_name_is_rejected() {
        let config = ProviderConfig::default();
        let registry = ProviderRegistry::new(config);
        let err = registry.build(Some("nonexistent"), None).unwrap_err();
        assert!(matches!(err, ProviderRegistryError::UnknownProvider(_)));
    }
}
