use std::collections::HashMap;
use std::sync::Arc;

use super::http_client::HttpClient;
use super::{GeminiProvider, GroqProvider};
use crate::domain::{DomainError, LlmProvider, ProviderKind};

const GOOGLE_KEY_VARS: &[&str] = &["GOOGLE_GENERATIVE_AI_API_KEY", "GEMINI_API_KEY"];
const GROQ_KEY_VARS: &[&str] = &["GROQ_API_KEY"];

/// API keys for the upstream vendors, read from the environment
#[derive(Clone, Default)]
pub struct ProviderKeys {
    pub google: Option<String>,
    pub groq: Option<String>,
}

impl std::fmt::Debug for ProviderKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderKeys")
            .field("google", &self.google.as_ref().map(|_| "***"))
            .field("groq", &self.groq.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ProviderKeys {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve keys through `lookup`, first non-blank variable wins
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|name| lookup(name))
                .map(|value| value.trim().to_string())
                .find(|value| !value.is_empty())
        };

        Self {
            google: first(GOOGLE_KEY_VARS),
            groq: first(GROQ_KEY_VARS),
        }
    }

    pub fn get(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Google => self.google.as_deref(),
            ProviderKind::Groq => self.groq.as_deref(),
        }
    }
}

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create a provider of `kind` authenticated with `api_key`
    pub fn create(kind: ProviderKind, api_key: &str) -> Result<Arc<dyn LlmProvider>, DomainError> {
        let http_client = HttpClient::new(kind.as_str())?;

        let provider: Arc<dyn LlmProvider> = match kind {
            ProviderKind::Google => Arc::new(GeminiProvider::new(http_client, api_key)),
            ProviderKind::Groq => Arc::new(GroqProvider::new(http_client, api_key)),
        };

        Ok(provider)
    }

    /// Build a registry holding every provider that has a key
    pub fn registry(keys: &ProviderKeys) -> Result<ProviderRegistry, DomainError> {
        let mut registry = ProviderRegistry::new();

        for kind in ProviderKind::ALL {
            match keys.get(kind) {
                Some(key) => {
                    registry = registry.with_provider(kind, Self::create(kind, key)?);
                    tracing::info!(provider = %kind, "LLM provider configured");
                }
                None => tracing::warn!(provider = %kind, "No API key set, provider disabled"),
            }
        }

        Ok(registry)
    }
}

/// Providers available to the request path, keyed by vendor
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, kind: ProviderKind, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }

    /// Look up a provider, failing with `ProviderNotConfigured` when absent
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn LlmProvider>, DomainError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| DomainError::provider_not_configured(kind.as_str()))
    }

    pub fn is_configured(&self, kind: ProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Configured vendors in a stable order
    pub fn configured(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|kind| self.is_configured(*kind))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_keys_prefer_google_generative_ai_var() {
        let keys = ProviderKeys::from_lookup(lookup(&[
            ("GOOGLE_GENERATIVE_AI_API_KEY", "primary"),
            ("GEMINI_API_KEY", "fallback"),
        ]));

        assert_eq!(keys.google.as_deref(), Some("primary"));
        assert!(keys.groq.is_none());
    }

    #[test]
    fn test_keys_fall_back_to_gemini_var_and_skip_blank() {
        let keys = ProviderKeys::from_lookup(lookup(&[
            ("GOOGLE_GENERATIVE_AI_API_KEY", "  "),
            ("GEMINI_API_KEY", "fallback"),
            ("GROQ_API_KEY", "gsk"),
        ]));

        assert_eq!(keys.google.as_deref(), Some("fallback"));
        assert_eq!(keys.groq.as_deref(), Some("gsk"));
    }

    #[test]
    fn test_keys_debug_redacts() {
        let keys = ProviderKeys {
            google: Some("secret".to_string()),
            groq: None,
        };
        assert!(!format!("{:?}", keys).contains("secret"));
    }

    #[test]
    fn test_create_providers() {
        let google = LlmProviderFactory::create(ProviderKind::Google, "k").unwrap();
        assert_eq!(google.provider_name(), "google");

        let groq = LlmProviderFactory::create(ProviderKind::Groq, "k").unwrap();
        assert_eq!(groq.provider_name(), "groq");
    }

    #[test]
    fn test_registry_only_holds_keyed_providers() {
        let keys = ProviderKeys {
            google: None,
            groq: Some("gsk".to_string()),
        };

        let registry = LlmProviderFactory::registry(&keys).unwrap();

        assert!(registry.is_configured(ProviderKind::Groq));
        assert!(matches!(
            registry.get(ProviderKind::Google),
            Err(DomainError::ProviderNotConfigured { provider }) if provider == "google"
        ));
    }
}
