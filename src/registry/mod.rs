//! 模型注册表 — 加载并索引厂商/模型能力元数据，加载后只读
//!
//! Model registry: provider and model capability metadata, loaded once and
//! immutable afterwards. Lookups are pure, so one `Arc<ModelRegistry>` can be
//! shared by any number of concurrent calls without synchronization.
//!
//! Loading runs in three steps: JSON Schema validation of the raw document
//! ([`schema`]), deserialization into [`source`] types, then semantic checks
//! (globally unique model ids, `stream_only` consistency, protocol family).

pub mod schema;
pub mod source;

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, ErrorContext};
use crate::Result;

pub use source::{ModelSource, ProviderSource, RegistrySource};

const BUILTIN_REGISTRY: &str = include_str!("builtin_models.yaml");

/// Wire protocol family spoken by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolFamily {
    /// OpenAI chat completions (OpenAI, DeepSeek, Volcengine Ark, ...).
    OpenAiCompatible,
    /// Anthropic Messages API.
    AnthropicNative,
    /// Google Gemini generateContent API.
    GoogleNative,
    /// Alibaba DashScope text-generation API.
    DashScopeNative,
}

impl ProtocolFamily {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "openai" => Some(Self::OpenAiCompatible),
            "anthropic" => Some(Self::AnthropicNative),
            "google" | "gemini" => Some(Self::GoogleNative),
            "dashscope" | "qwen" => Some(Self::DashScopeNative),
            _ => None,
        }
    }

    /// `uses_openai_protocol` wins, then an explicit `protocol` tag, then the provider id.
    fn resolve(provider_id: &str, src: &ProviderSource) -> Option<Self> {
        if src.uses_openai_protocol {
            return Some(Self::OpenAiCompatible);
        }
        if let Some(tag) = src.protocol.as_deref() {
            return Self::from_tag(tag);
        }
        Self::from_tag(provider_id)
    }
}

impl fmt::Display for ProtocolFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::OpenAiCompatible => "openai_compatible",
            Self::AnthropicNative => "anthropic_native",
            Self::GoogleNative => "google_native",
            Self::DashScopeNative => "dashscope_native",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderDescriptor {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    pub family: ProtocolFamily,
    pub supports_streaming: bool,
    pub supports_mcp: bool,
    /// Ids of the models this provider declares, sorted.
    pub model_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    /// Owning provider; look it up with [`ModelRegistry::provider`].
    pub provider_id: String,
    pub max_tokens: u32,
    pub supports_temperature: bool,
    /// Effective flag: false when either the model or its provider lacks streaming.
    pub supports_streaming: bool,
    pub supports_thinking: bool,
    pub stream_only: bool,
    pub is_reasoning_model: bool,
}

/// Immutable index of providers and models.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    providers: Vec<ProviderDescriptor>,
    models: Vec<ModelDescriptor>,
    provider_index: HashMap<String, usize>,
    model_index: HashMap<String, usize>,
}

impl ModelRegistry {
    /// The catalogue shipped with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_REGISTRY)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let doc: serde_json::Value = serde_yaml::from_str(text).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid registry YAML: {}", e),
                ErrorContext::new().with_source("registry_loader"),
            )
        })?;
        Self::from_document(doc)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let doc: serde_json::Value = serde_json::from_str(text).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid registry JSON: {}", e),
                ErrorContext::new().with_source("registry_loader"),
            )
        })?;
        Self::from_document(doc)
    }

    /// Load from a `.yaml`/`.yml`/`.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration_with_context(
                format!("failed to read registry file: {}", e),
                ErrorContext::new()
                    .with_field_path(path.display().to_string())
                    .with_source("registry_loader"),
            )
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    fn from_document(doc: serde_json::Value) -> Result<Self> {
        schema::validate_document(&doc)?;
        let source: RegistrySource = serde_json::from_value(doc).map_err(|e| {
            Error::configuration_with_context(
                format!("registry source does not match expected shape: {}", e),
                ErrorContext::new().with_source("registry_loader"),
            )
        })?;
        Self::from_source(source)
    }

    /// Build from already-deserialized source data, enforcing the registry invariants.
    pub fn from_source(source: RegistrySource) -> Result<Self> {
        let mut providers = Vec::with_capacity(source.providers.len());
        let mut models: Vec<ModelDescriptor> = Vec::new();
        let mut provider_index = HashMap::new();
        let mut model_index: HashMap<String, usize> = HashMap::new();

        for (provider_id, src) in source.providers {
            let field = format!("providers.{}", provider_id);
            let family = ProtocolFamily::resolve(&provider_id, &src).ok_or_else(|| {
                Error::configuration_with_context(
                    format!("cannot determine protocol family for provider '{}'", provider_id),
                    ErrorContext::new()
                        .with_field_path(field.clone())
                        .with_details("set uses_openai_protocol: true or protocol: openai|anthropic|google|dashscope")
                        .with_source("registry_loader"),
                )
            })?;
            url::Url::parse(&src.base_url).map_err(|e| {
                Error::configuration_with_context(
                    format!("invalid base_url for provider '{}': {}", provider_id, e),
                    ErrorContext::new()
                        .with_field_path(format!("{}.base_url", field))
                        .with_source("registry_loader"),
                )
            })?;

            let mut model_ids = Vec::with_capacity(src.models.len());
            for (model_id, m) in src.models {
                let model_field = format!("{}.models.{}", field, model_id);
                if model_id.trim().is_empty() {
                    return Err(Error::configuration_with_context(
                        "model id must not be empty",
                        ErrorContext::new()
                            .with_field_path(model_field)
                            .with_source("registry_loader"),
                    ));
                }
                if let Some(&existing) = model_index.get(&model_id) {
                    return Err(Error::configuration_with_context(
                        format!("duplicate model id '{}'", model_id),
                        ErrorContext::new()
                            .with_field_path(model_field)
                            .with_details(format!(
                                "already declared by provider '{}'",
                                models[existing].provider_id
                            ))
                            .with_source("registry_loader"),
                    ));
                }
                if m.stream_only && !m.supports_streaming {
                    return Err(Error::configuration_with_context(
                        format!("model '{}' is stream_only but does not support streaming", model_id),
                        ErrorContext::new()
                            .with_field_path(format!("{}.stream_only", model_field))
                            .with_source("registry_loader"),
                    ));
                }
                if m.stream_only && !src.supports_streaming {
                    return Err(Error::configuration_with_context(
                        format!(
                            "model '{}' is stream_only but provider '{}' does not support streaming",
                            model_id, provider_id
                        ),
                        ErrorContext::new()
                            .with_field_path(format!("{}.supports_streaming", field))
                            .with_source("registry_loader"),
                    ));
                }
                if m.supports_streaming && !src.supports_streaming {
                    debug!(provider = %provider_id, model = %model_id, "provider lacks streaming; model streaming disabled");
                }

                model_index.insert(model_id.clone(), models.len());
                model_ids.push(model_id.clone());
                models.push(ModelDescriptor {
                    id: model_id,
                    display_name: m.name,
                    provider_id: provider_id.clone(),
                    max_tokens: m.max_tokens,
                    supports_temperature: m.supports_temperature,
                    supports_streaming: m.supports_streaming && src.supports_streaming,
                    supports_thinking: m.supports_thinking,
                    stream_only: m.stream_only,
                    is_reasoning_model: m.is_reasoning_model,
                });
            }

            provider_index.insert(provider_id.clone(), providers.len());
            providers.push(ProviderDescriptor {
                id: provider_id,
                display_name: src.name,
                base_url: src.base_url,
                family,
                supports_streaming: src.supports_streaming,
                supports_mcp: src.supports_mcp,
                model_ids,
            });
        }

        debug!(
            providers = providers.len(),
            models = models.len(),
            "model registry loaded"
        );

        Ok(Self {
            providers,
            models,
            provider_index,
            model_index,
        })
    }

    /// Resolve a globally unique model id to its provider and descriptor.
    pub fn resolve(&self, model_id: &str) -> Result<(&ProviderDescriptor, &ModelDescriptor)> {
        self.resolve_in(model_id, None)
    }

    /// Resolve a model id, optionally restricted to one provider.
    pub fn resolve_in(
        &self,
        model_id: &str,
        provider_filter: Option<&str>,
    ) -> Result<(&ProviderDescriptor, &ModelDescriptor)> {
        if let Some(pid) = provider_filter {
            let provider = self.require_provider(pid)?;
            return match self.model_index.get(model_id).map(|&i| &self.models[i]) {
                Some(model) if model.provider_id == provider.id => Ok((provider, model)),
                _ => Err(Error::UnknownModel {
                    model: model_id.to_string(),
                    provider: Some(pid.to_string()),
                    available: provider.model_ids.clone(),
                }),
            };
        }

        let model = self
            .model_index
            .get(model_id)
            .map(|&i| &self.models[i])
            .ok_or_else(|| Error::UnknownModel {
                model: model_id.to_string(),
                provider: None,
                available: self.models.iter().map(|m| m.id.clone()).collect(),
            })?;
        let provider = self.require_provider(&model.provider_id)?;
        Ok((provider, model))
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderDescriptor> {
        self.provider_index.get(id).map(|&i| &self.providers[i])
    }

    pub fn model(&self, id: &str) -> Option<&ModelDescriptor> {
        self.model_index.get(id).map(|&i| &self.models[i])
    }

    /// All providers, ordered by id.
    pub fn list_providers(&self) -> &[ProviderDescriptor] {
        &self.providers
    }

    /// All models, or only those of `provider_filter`. Unknown filter is a configuration error.
    pub fn list_models(&self, provider_filter: Option<&str>) -> Result<Vec<&ModelDescriptor>> {
        match provider_filter {
            Some(pid) => {
                let provider = self.require_provider(pid)?;
                Ok(self
                    .models
                    .iter()
                    .filter(|m| m.provider_id == provider.id)
                    .collect())
            }
            None => Ok(self.models.iter().collect()),
        }
    }

    fn require_provider(&self, id: &str) -> Result<&ProviderDescriptor> {
        self.provider(id).ok_or_else(|| {
            Error::configuration_with_context(
                format!("unknown provider '{}'", id),
                ErrorContext::new()
                    .with_details(format!(
                        "available providers: {}",
                        self.providers
                            .iter()
                            .map(|p| p.id.as_str())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ))
                    .with_source("model_registry"),
            )
        })
    }
}
