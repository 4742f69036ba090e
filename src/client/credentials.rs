//! Per-provider API keys and base URL overrides.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::registry::{ModelRegistry, ProtocolFamily};

/// API keys and base URL overrides keyed by provider id.
///
/// `Debug` never prints key material.
#[derive(Clone, Default)]
pub struct Credentials {
    api_keys: HashMap<String, String>,
    base_urls: HashMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.set_api_key(provider, key);
        self
    }

    pub fn with_base_url(mut self, provider: impl Into<String>, url: impl Into<String>) -> Self {
        self.set_base_url(provider, url);
        self
    }

    /// Empty keys are ignored.
    pub fn set_api_key(&mut self, provider: impl Into<String>, key: impl Into<String>) {
        let key = key.into();
        if !key.trim().is_empty() {
            self.api_keys.insert(provider.into(), key);
        }
    }

    pub fn set_base_url(&mut self, provider: impl Into<String>, url: impl Into<String>) {
        self.base_urls.insert(provider.into(), url.into());
    }

    pub fn api_key(&self, provider: &str) -> Option<&str> {
        self.api_keys.get(provider).map(String::as_str)
    }

    pub fn base_url(&self, provider: &str) -> Option<&str> {
        self.base_urls.get(provider).map(String::as_str)
    }

    pub(crate) fn base_urls(&self) -> impl Iterator<Item = (&str, &str)> {
        self.base_urls.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries from `other` replace entries for the same provider.
    pub fn merge(&mut self, other: Credentials) {
        self.api_keys.extend(other.api_keys);
        self.base_urls.extend(other.base_urls);
    }

    /// Read `<PROVIDER>_API_KEY` and `<PROVIDER>_BASE_URL` for every registered provider.
    ///
    /// Google-family providers also accept `GEMINI_API_KEY`, DashScope-family
    /// providers `DASHSCOPE_API_KEY`.
    pub fn from_env(registry: &ModelRegistry) -> Self {
        let mut creds = Self::new();
        for provider in registry.list_providers() {
            let prefix = env_prefix(&provider.id);
            let alias = match provider.family {
                ProtocolFamily::GoogleNative => Some("GEMINI"),
                ProtocolFamily::DashScopeNative => Some("DASHSCOPE"),
                _ => None,
            };
            let key = std::env::var(format!("{}_API_KEY", prefix))
                .ok()
                .filter(|k| !k.trim().is_empty())
                .or_else(|| alias.and_then(|a| std::env::var(format!("{}_API_KEY", a)).ok()));
            if let Some(key) = key {
                creds.set_api_key(&provider.id, key);
            }
            if let Ok(url) = std::env::var(format!("{}_BASE_URL", prefix)) {
                if !url.trim().is_empty() {
                    creds.set_base_url(&provider.id, url);
                }
            }
        }
        tracing::debug!(
            providers = ?creds.api_keys.keys().collect::<Vec<_>>(),
            "credentials loaded from environment"
        );
        creds
    }
}

/// `volcengine` -> `VOLCENGINE`, `my-llm` -> `MY_LLM`.
pub fn env_prefix(provider_id: &str) -> String {
    provider_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: BTreeMap<&str, &str> = self
            .api_keys
            .keys()
            .map(|k| (k.as_str(), "<redacted>"))
            .collect();
        let urls: BTreeMap<&str, &str> = self.base_urls().collect();
        f.debug_struct("Credentials")
            .field("api_keys", &keys)
            .field("base_urls", &urls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_hides_keys() {
        let creds = Credentials::new()
            .with_api_key("openai", "sk-very-secret")
            .with_base_url("openai", "http://localhost:8080/v1");
        let dbg = format!("{:?}", creds);
        assert!(!dbg.contains("sk-very-secret"));
        assert!(dbg.contains("<redacted>"));
        assert!(dbg.contains("localhost:8080"));
    }

    #[test]
    fn empty_key_is_missing() {
        let creds = Credentials::new().with_api_key("openai", "  ");
        assert_eq!(creds.api_key("openai"), None);
    }

    #[test]
    fn merge_overrides_per_provider() {
        let mut base = Credentials::new()
            .with_api_key("openai", "a")
            .with_api_key("anthropic", "b");
        base.merge(Credentials::new().with_api_key("openai", "c"));
        assert_eq!(base.api_key("openai"), Some("c"));
        assert_eq!(base.api_key("anthropic"), Some("b"));
    }

    #[test]
    fn env_prefix_normalizes_ids() {
        assert_eq!(env_prefix("volcengine"), "VOLCENGINE");
        assert_eq!(env_prefix("my-llm.v2"), "MY_LLM_V2");
    }
}
