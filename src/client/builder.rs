use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::client::core::UnifiedClient;
use crate::client::credentials::Credentials;
use crate::drivers::{create_driver, ProviderDriver};
use crate::registry::ModelRegistry;
use crate::transport::{HttpTransport, Transport, TransportConfig};
use crate::{Error, ErrorContext, Result};

/// Builder for creating clients with custom configuration.
///
/// Defaults: the built-in registry, `TransportConfig::from_env()`, and no
/// credentials unless [`credentials_from_env`](Self::credentials_from_env) is set.
pub struct UnifiedClientBuilder {
    registry: Option<Arc<ModelRegistry>>,
    registry_path: Option<PathBuf>,
    transport_config: Option<TransportConfig>,
    transport: Option<Arc<dyn Transport>>,
    credentials: Credentials,
    credentials_from_env: bool,
}

impl UnifiedClientBuilder {
    pub fn new() -> Self {
        Self {
            registry: None,
            registry_path: None,
            transport_config: None,
            transport: None,
            credentials: Credentials::new(),
            credentials_from_env: false,
        }
    }

    /// Use an already loaded registry.
    pub fn registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = Some(Arc::new(registry));
        self
    }

    /// Share a registry snapshot with other clients.
    pub fn shared_registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Load the registry from a YAML or JSON file at build time.
    pub fn registry_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_path = Some(path.into());
        self
    }

    /// Timeout and proxy for the default HTTP transport.
    pub fn transport_config(mut self, config: TransportConfig) -> Self {
        self.transport_config = Some(config);
        self
    }

    /// Replace the HTTP transport entirely (tests, custom stacks).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn api_key(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.credentials.set_api_key(provider, key);
        self
    }

    /// Override a provider's registry base URL (mock servers, gateways).
    pub fn base_url_override(mut self, provider: impl Into<String>, url: impl Into<String>) -> Self {
        self.credentials.set_base_url(provider, url);
        self
    }

    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials.merge(credentials);
        self
    }

    /// Also read `<PROVIDER>_API_KEY` / `<PROVIDER>_BASE_URL`. Explicit values win.
    pub fn credentials_from_env(mut self, enable: bool) -> Self {
        self.credentials_from_env = enable;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<UnifiedClient> {
        let registry = match (self.registry, self.registry_path) {
            (Some(registry), _) => registry,
            (None, Some(path)) => Arc::new(ModelRegistry::from_path(path)?),
            (None, None) => Arc::new(ModelRegistry::builtin()?),
        };

        let credentials = if self.credentials_from_env {
            let mut creds = Credentials::from_env(&registry);
            creds.merge(self.credentials);
            creds
        } else {
            self.credentials
        };
        for (provider, url) in credentials.base_urls() {
            if registry.provider(provider).is_none() {
                return Err(Error::configuration_with_context(
                    format!("base URL override for unknown provider '{}'", provider),
                    ErrorContext::new().with_source("client_builder"),
                ));
            }
            Url::parse(url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid base URL override for '{}': {}", provider, e),
                    ErrorContext::new()
                        .with_field_path(provider)
                        .with_source("client_builder"),
                )
            })?;
        }

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => {
                let config = match self.transport_config {
                    Some(c) => c,
                    None => TransportConfig::from_env()?,
                };
                Arc::new(HttpTransport::new(&config)?)
            }
        };

        let drivers: HashMap<String, Arc<dyn ProviderDriver>> = registry
            .list_providers()
            .iter()
            .map(|p| (p.id.clone(), Arc::from(create_driver(p.family, &p.id))))
            .collect();

        debug!(
            providers = registry.list_providers().len(),
            credentials = ?credentials,
            "unified client built"
        );

        Ok(UnifiedClient::from_parts(
            registry,
            transport,
            credentials,
            drivers,
        ))
    }
}

impl Default for UnifiedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn builds_with_builtin_registry() {
        let client = UnifiedClientBuilder::new()
            .transport_config(TransportConfig::default())
            .api_key("openai", "sk-test")
            .build()
            .unwrap();
        assert!(client.registry().provider("anthropic").is_some());
    }

    #[test]
    fn rejects_bad_base_url_override() {
        let err = UnifiedClientBuilder::new()
            .transport_config(TransportConfig::default())
            .base_url_override("openai", "not a url")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = UnifiedClientBuilder::new()
            .transport_config(TransportConfig::default())
            .base_url_override("nobody", "http://localhost:1")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn missing_registry_file_is_configuration_error() {
        let err = UnifiedClientBuilder::new()
            .registry_path("/definitely/not/here.yaml")
            .transport_config(TransportConfig::default())
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
