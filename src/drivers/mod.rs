//! Provider 驱动抽象层 — 通过 trait 实现多厂商协议族适配的动态分发
//!
//! Provider driver abstraction. One [`ProviderDriver`] implementation per protocol
//! family; the client selects it from the registry's [`ProtocolFamily`] and never
//! contains provider-specific logic itself. Adding a provider that speaks an
//! existing family is a registry entry; adding a family is a new driver here.
//!
//! Drivers are pure translators: they build [`WireRequest`]s and parse bodies or
//! stream frames. They do no I/O, no validation and no retries.

pub mod anthropic;
pub mod dashscope;
pub mod gemini;

use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::client::validation::ValidatedConfig;
use crate::error::{Error, ErrorContext};
use crate::registry::ProtocolFamily;
use crate::transport::WireRequest;
use crate::types::{Message, StreamEvent, Usage};
use crate::Result;

pub use anthropic::AnthropicDriver;
pub use dashscope::DashScopeDriver;
pub use gemini::GeminiDriver;

/// Where and as whom a request is sent.
#[derive(Clone, Copy)]
pub struct Endpoint<'a> {
    pub base_url: &'a str,
    pub api_key: &'a str,
}

/// Provider-independent result of parsing a non-streaming body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedResponse {
    pub content: String,
    /// Reasoning text, only on protocols that expose it separately.
    pub thinking: Option<String>,
    pub usage: Option<Usage>,
}

/// Core trait for protocol-family adaptation.
///
/// Object-safe; the client holds one `Box<dyn ProviderDriver>` per provider.
pub trait ProviderDriver: Send + Sync + std::fmt::Debug {
    /// Provider id this instance serves (used in errors).
    fn provider_id(&self) -> &str;

    fn family(&self) -> ProtocolFamily;

    /// Serialize messages and validated options into the provider's wire shape.
    fn build_payload(
        &self,
        endpoint: &Endpoint<'_>,
        messages: &[Message],
        config: &ValidatedConfig,
    ) -> Result<WireRequest>;

    /// Parse a successful non-streaming body. Absent usage stays `None`.
    fn parse_response(&self, body: &Value) -> Result<ParsedResponse>;

    /// Translate one SSE `data` payload into zero or more canonical events.
    fn parse_stream_event(&self, data: &str) -> Result<Vec<StreamEvent>>;
}

/// Factory: pick the driver for a protocol family.
pub fn create_driver(family: ProtocolFamily, provider_id: &str) -> Box<dyn ProviderDriver> {
    match family {
        ProtocolFamily::OpenAiCompatible => Box::new(OpenAiDriver::new(provider_id)),
        ProtocolFamily::AnthropicNative => Box::new(AnthropicDriver::new(provider_id)),
        ProtocolFamily::GoogleNative => Box::new(GeminiDriver::new(provider_id)),
        ProtocolFamily::DashScopeNative => Box::new(DashScopeDriver::new(provider_id)),
    }
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

/// Caller pass-through options go in last and win over computed fields.
pub(crate) fn merge_options(body: &mut Value, options: &Map<String, Value>) {
    if let Value::Object(map) = body {
        for (k, v) in options {
            map.insert(k.clone(), v.clone());
        }
    }
}

pub(crate) fn parse_json(provider: &str, data: &str) -> Result<Value> {
    serde_json::from_str(data).map_err(|e| {
        Error::protocol_with_context(
            provider,
            format!("stream chunk is not valid JSON: {}", e),
            ErrorContext::new()
                .with_details(truncate_for_log(data))
                .with_source("stream_parser"),
        )
    })
}

pub(crate) fn truncate_for_log(data: &str) -> String {
    data.chars().take(200).collect()
}

pub(crate) fn u64_at(v: &Value, pointer: &str) -> Option<u64> {
    v.pointer(pointer).and_then(Value::as_u64)
}

pub(crate) fn str_at<'a>(v: &'a Value, pointer: &str) -> Option<&'a str> {
    v.pointer(pointer).and_then(Value::as_str)
}

/// OpenAI-compatible driver: OpenAI, DeepSeek, Volcengine Ark and friends.
#[derive(Debug)]
pub struct OpenAiDriver {
    provider_id: String,
}

impl OpenAiDriver {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }

    fn usage(u: &Value) -> Option<Usage> {
        if !u.is_object() {
            return None;
        }
        Usage {
            prompt_tokens: u64_at(u, "/prompt_tokens"),
            completion_tokens: u64_at(u, "/completion_tokens"),
            total_tokens: u64_at(u, "/total_tokens"),
            reasoning_tokens: u64_at(u, "/completion_tokens_details/reasoning_tokens"),
        }
        .non_empty()
    }
}

impl ProviderDriver for OpenAiDriver {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::OpenAiCompatible
    }

    fn build_payload(
        &self,
        endpoint: &Endpoint<'_>,
        messages: &[Message],
        config: &ValidatedConfig,
    ) -> Result<WireRequest> {
        let oai_messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": config.model_id(),
            "messages": oai_messages,
            "stream": config.stream(),
        });
        if let Some(t) = config.temperature() {
            body["temperature"] = json!(t);
        }
        if let Some(mt) = config.max_tokens() {
            // OpenAI's o-series reject `max_tokens`; compatible vendors still expect it.
            let field = if config.is_reasoning_model() && self.provider_id == "openai" {
                "max_completion_tokens"
            } else {
                "max_tokens"
            };
            body[field] = json!(mt);
        }
        if config.stream() {
            body["stream_options"] = json!({ "include_usage": true });
        }
        merge_options(&mut body, config.options());

        let mut headers = HashMap::new();
        headers.insert(
            "authorization".to_string(),
            format!("Bearer {}", endpoint.api_key),
        );

        Ok(WireRequest {
            url: join_url(endpoint.base_url, "/chat/completions"),
            method: "POST".into(),
            headers,
            body,
            stream: config.stream(),
        })
    }

    fn parse_response(&self, body: &Value) -> Result<ParsedResponse> {
        let message = body.pointer("/choices/0/message").ok_or_else(|| {
            Error::protocol_with_context(
                &self.provider_id,
                "response has no choices[0].message",
                ErrorContext::new()
                    .with_field_path("choices[0].message")
                    .with_source("openai_driver"),
            )
        })?;
        let content = message
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let thinking = message
            .get("reasoning_content")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(ParsedResponse {
            content,
            thinking,
            usage: body
                .get("usage")
                .and_then(Self::usage)
                .map(Usage::finalize),
        })
    }

    fn parse_stream_event(&self, data: &str) -> Result<Vec<StreamEvent>> {
        let data = data.trim();
        if data.is_empty() {
            return Ok(Vec::new());
        }
        if data == "[DONE]" {
            return Ok(vec![StreamEvent::Done]);
        }
        let v = parse_json(&self.provider_id, data)?;
        if v.get("error").is_some() {
            return Err(crate::client::error_classification::from_stream_payload(
                &self.provider_id,
                &v,
            ));
        }

        let mut events = Vec::new();
        if let Some(thinking) = str_at(&v, "/choices/0/delta/reasoning_content") {
            if !thinking.is_empty() {
                events.push(StreamEvent::ThinkingDelta(thinking.to_string()));
            }
        }
        if let Some(content) = str_at(&v, "/choices/0/delta/content") {
            if !content.is_empty() {
                events.push(StreamEvent::ContentDelta(content.to_string()));
            }
        }
        if let Some(usage) = v.get("usage").and_then(Self::usage) {
            events.push(StreamEvent::UsageFinal(usage));
        }
        Ok(events)
    }
}
