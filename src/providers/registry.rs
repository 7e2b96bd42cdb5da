//! Provider registry: model identifier to provider resolution.
//!
//! Providers are registered with a list of model-id prefixes. Resolution is
//! first-match over registration order; an unresolvable model yields `None`
//! so callers can degrade to a diagnostic instead of erroring.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::config::Config;

use super::{LLMProvider, OpenAIProvider};

/// Built-in endpoint and prefix defaults for known provider names.
///
/// A config entry can override both; these apply when it only carries a key.
const KNOWN_PROVIDERS: &[(&str, &str, &[&str])] = &[
    ("openai", "https://api.openai.com/v1", &["gpt-", "o1-", "o3-"]),
    ("openrouter", "https://openrouter.ai/api/v1", &["openrouter/"]),
    ("groq", "https://api.groq.com/openai/v1", &["llama-", "mixtral-"]),
];

/// Maps model-id prefixes to shared provider instances.
pub struct ProviderRegistry {
    /// (prefix, provider) pairs checked in registration order
    routes: Vec<(String, Arc<dyn LLMProvider>)>,
    /// Providers by name, for direct lookup
    by_name: HashMap<String, Arc<dyn LLMProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    /// Build a registry from configured provider credentials.
    ///
    /// Entries without an API key are skipped with a warning.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();

        for (name, pc) in &config.providers {
            let api_key = match pc.api_key.as_deref().filter(|k| !k.is_empty()) {
                Some(k) => k,
                None => {
                    warn!(provider = %name, "provider configured without api key, skipping");
                    continue;
                }
            };

            let known = KNOWN_PROVIDERS.iter().find(|(n, _, _)| n == name);

            let api_base = pc
                .api_base
                .as_deref()
                .or(known.map(|(_, base, _)| *base))
                .unwrap_or("https://api.openai.com/v1");

            let prefixes: Vec<String> = if pc.model_prefixes.is_empty() {
                known
                    .map(|(_, _, p)| p.iter().map(|s| s.to_string()).collect())
                    .unwrap_or_default()
            } else {
                pc.model_prefixes.clone()
            };

            let provider: Arc<dyn LLMProvider> =
                Arc::new(OpenAIProvider::with_base_url(api_key, api_base));

            registry.register(name, prefixes, provider);
        }

        registry
    }

    /// Register a provider under a name with its model-id prefixes.
    pub fn register(&mut self, name: &str, prefixes: Vec<String>, provider: Arc<dyn LLMProvider>) {
        for prefix in prefixes {
            self.routes.push((prefix, Arc::clone(&provider)));
        }
        self.by_name.insert(name.to_string(), provider);
    }

    /// Resolve a model identifier to a provider, or `None` if no configured
    /// provider serves it.
    pub fn resolve(&self, model: &str) -> Option<Arc<dyn LLMProvider>> {
        self.routes
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix.as_str()))
            .map(|(_, provider)| Arc::clone(provider))
    }

    /// Look up a provider by its configured name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn LLMProvider>> {
        self.by_name.get(name).cloned()
    }

    /// Names of all registered providers.
    pub fn names(&self) -> Vec<String> {
        self.by_name.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;

    fn config_with_openai() -> Config {
        let mut config = Config::default();
        config.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_key: Some("sk-test".to_string()),
                api_base: None,
                model_prefixes: vec![],
            },
        );
        config
    }

    #[test]
    fn test_resolve_by_default_prefix() {
        let registry = ProviderRegistry::from_config(&config_with_openai());
        assert!(registry.resolve("gpt-4o-mini").is_some());
        assert!(registry.resolve("o1-preview").is_some());
    }

    #[test]
    fn test_unresolvable_model_is_none() {
        let registry = ProviderRegistry::from_config(&config_with_openai());
        assert!(registry.resolve("claude-3-opus").is_none());
    }

    #[test]
    fn test_missing_api_key_skipped() {
        let mut config = Config::default();
        config
            .providers
            .insert("openai".to_string(), ProviderConfig::default());
        let registry = ProviderRegistry::from_config(&config);
        assert!(registry.is_empty());
        assert!(registry.resolve("gpt-4o").is_none());
    }

    #[test]
    fn test_custom_prefixes_override_defaults() {
        let mut config = Config::default();
        config.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_key: Some("sk-test".to_string()),
                api_base: Some("https://local:8000/v1".to_string()),
                model_prefixes: vec!["local-".to_string()],
            },
        );
        let registry = ProviderRegistry::from_config(&config);
        assert!(registry.resolve("local-llama").is_some());
        assert!(registry.resolve("gpt-4o").is_none());
    }

    #[test]
    fn test_get_by_name() {
        let registry = ProviderRegistry::from_config(&config_with_openai());
        assert!(registry.get("openai").is_some());
        assert!(registry.get("groq").is_none());
    }
}
