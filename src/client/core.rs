use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::client::builder::UnifiedClientBuilder;
use crate::client::credentials::{env_prefix, Credentials};
use crate::client::error_classification::from_http_response;
use crate::client::types::EventStream;
use crate::client::validation::{self, ValidatedConfig};
use crate::drivers::{truncate_for_log, Endpoint, ProviderDriver};
use crate::pipeline::{self, EventBoxStream};
use crate::registry::{ModelDescriptor, ModelRegistry, ProviderDescriptor};
use crate::transport::{Transport, WireRequest};
use crate::types::{Message, RequestConfig, UnifiedResponse};
use crate::{Error, ErrorContext, Result};

/// Unified client: one entry point for every registered provider.
///
/// Holds only read-only state (registry snapshot, credentials, stateless
/// drivers), so a single instance serves any number of concurrent calls.
pub struct UnifiedClient {
    registry: Arc<ModelRegistry>,
    transport: Arc<dyn Transport>,
    credentials: Credentials,
    drivers: HashMap<String, Arc<dyn ProviderDriver>>,
}

/// Everything resolved before the first byte goes out.
struct PreparedCall {
    provider_id: String,
    model_id: String,
    driver: Arc<dyn ProviderDriver>,
    validated: ValidatedConfig,
    wire: WireRequest,
}

impl UnifiedClient {
    pub fn builder() -> UnifiedClientBuilder {
        UnifiedClientBuilder::new()
    }

    /// Built-in registry, transport settings and credentials from the environment.
    pub fn from_env() -> Result<Self> {
        UnifiedClientBuilder::new().credentials_from_env(true).build()
    }

    pub(crate) fn from_parts(
        registry: Arc<ModelRegistry>,
        transport: Arc<dyn Transport>,
        credentials: Credentials,
        drivers: HashMap<String, Arc<dyn ProviderDriver>>,
    ) -> Self {
        Self {
            registry,
            transport,
            credentials,
            drivers,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn list_providers(&self) -> &[ProviderDescriptor] {
        self.registry.list_providers()
    }

    pub fn list_models(&self, provider: Option<&str>) -> Result<Vec<&ModelDescriptor>> {
        self.registry.list_models(provider)
    }

    pub fn model_info(&self, model: &str, provider: Option<&str>) -> Result<&ModelDescriptor> {
        self.registry.resolve_in(model, provider).map(|(_, m)| m)
    }

    /// Generate a complete response.
    ///
    /// Stream-only models (and `config.stream == true`) are served over the
    /// streaming path and collected, so the result has the same shape either way.
    pub async fn generate(
        &self,
        messages: &[Message],
        config: &RequestConfig,
    ) -> Result<UnifiedResponse> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("generate", request_id = %request_id, model = %config.model);
        async move {
            let call = self.prepare(messages, config)?;
            let start = Instant::now();
            let streamed = call.validated.stream();
            let thinking_enabled = call.validated.thinking_enabled();

            let parsed = if streamed {
                let events = self.open_stream(call.wire, &call.driver, thinking_enabled).await?;
                pipeline::collect(events).await?
            } else {
                let raw = self.transport.send(call.wire).await?;
                if !raw.is_success() {
                    return Err(from_http_response(
                        &call.provider_id,
                        raw.status,
                        &raw.headers,
                        &raw.body,
                    ));
                }
                let body: Value = serde_json::from_slice(&raw.body).map_err(|e| {
                    Error::protocol_with_context(
                        &call.provider_id,
                        format!("response body is not valid JSON: {}", e),
                        ErrorContext::new()
                            .with_details(truncate_for_log(&String::from_utf8_lossy(&raw.body)))
                            .with_source("unified_client"),
                    )
                })?;
                call.driver.parse_response(&body)?
            };

            info!(
                provider = call.provider_id.as_str(),
                model = call.model_id.as_str(),
                streamed,
                duration_ms = start.elapsed().as_millis() as u64,
                "generation completed"
            );

            Ok(UnifiedResponse {
                content: parsed.content,
                thinking: parsed.thinking.filter(|_| thinking_enabled),
                provider: call.provider_id,
                model: call.model_id,
                usage: parsed.usage,
                request_id: request_id.clone(),
            })
        }
        .instrument(span)
        .await
    }

    /// Start a streaming generation.
    ///
    /// Failures before the response body starts (resolution, validation,
    /// connection, non-2xx status) are returned as `Err`; anything later arrives
    /// as the stream's terminal [`StreamEvent::Error`](crate::types::StreamEvent::Error).
    pub async fn generate_stream(
        &self,
        messages: &[Message],
        config: &RequestConfig,
    ) -> Result<EventStream> {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("generate_stream", request_id = %request_id, model = %config.model);
        async move {
            let mut config = config.clone();
            config.stream = true;
            let call = self.prepare(messages, &config)?;
            let events = self
                .open_stream(call.wire, &call.driver, call.validated.thinking_enabled())
                .await?;
            info!(
                provider = call.provider_id.as_str(),
                model = call.model_id.as_str(),
                "stream opened"
            );
            Ok(EventStream::new(
                events,
                call.provider_id,
                call.model_id,
                request_id.clone(),
            ))
        }
        .instrument(span)
        .await
    }

    /// Resolve, validate and build the wire request. No I/O.
    fn prepare(&self, messages: &[Message], config: &RequestConfig) -> Result<PreparedCall> {
        if messages.is_empty() {
            return Err(Error::invalid_request(
                "at least one message is required",
                ErrorContext::new().with_field_path("messages"),
            ));
        }

        let (provider, model) = self
            .registry
            .resolve_in(&config.model, config.provider.as_deref())?;
        let validated = validation::check(config, model)?;

        let driver = self.drivers.get(&provider.id).cloned().ok_or_else(|| {
            Error::configuration(format!("no driver registered for provider '{}'", provider.id))
        })?;
        let api_key = self.credentials.api_key(&provider.id).ok_or_else(|| {
            Error::configuration_with_context(
                format!("no API key configured for provider '{}'", provider.id),
                ErrorContext::new()
                    .with_field_path(provider.id.clone())
                    .with_details(format!("set {}_API_KEY", env_prefix(&provider.id)))
                    .with_source("unified_client"),
            )
        })?;
        let base_url = self
            .credentials
            .base_url(&provider.id)
            .unwrap_or(&provider.base_url);

        let wire = driver.build_payload(&Endpoint { base_url, api_key }, messages, &validated)?;
        debug!(
            provider = provider.id.as_str(),
            family = %provider.family,
            stream = validated.stream(),
            adjustments = ?validated.adjustments(),
            url = wire.url.as_str(),
            "request prepared"
        );

        Ok(PreparedCall {
            provider_id: provider.id.clone(),
            model_id: model.id.clone(),
            driver,
            validated,
            wire,
        })
    }

    async fn open_stream(
        &self,
        wire: WireRequest,
        driver: &Arc<dyn ProviderDriver>,
        thinking: bool,
    ) -> Result<EventBoxStream> {
        let raw = self.transport.send_streaming(wire).await?;
        if !raw.is_success() {
            let raw = raw.collect().await?;
            return Err(from_http_response(
                driver.provider_id(),
                raw.status,
                &raw.headers,
                &raw.body,
            ));
        }
        Ok(pipeline::event_stream(raw.body, driver.clone(), thinking))
    }
}

impl std::fmt::Debug for UnifiedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnifiedClient")
            .field("providers", &self.registry.list_providers().len())
            .field("models", &self.registry.list_models(None).map(|m| m.len()).unwrap_or(0))
            .field("transport", &self.transport)
            .field("credentials", &self.credentials)
            .finish()
    }
}
