//! Anthropic Messages API 驱动 — 实现 Anthropic 特有的请求/响应格式转换
//!
//! Anthropic Messages API driver. Differences from OpenAI:
//! - System messages are a top-level `system` parameter, not part of `messages`.
//! - `max_tokens` is required.
//! - Extended thinking is requested with `thinking: {type: enabled, budget_tokens}`
//!   and returned as `thinking` content blocks. No `temperature` is sent with it.
//! - `temperature` ranges over `0.0..=1.0`; larger values are clamped.
//! - Streaming is typed (`message_start`, `content_block_delta`, `message_delta`,
//!   `message_stop`, `error`); usage arrives split across `message_start` and
//!   `message_delta`.

use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::warn;

use super::{
    join_url, merge_options, parse_json, str_at, u64_at, Endpoint, ParsedResponse,
    ProviderDriver,
};
use crate::client::error_classification::from_stream_payload;
use crate::client::validation::ValidatedConfig;
use crate::error::{Error, ErrorContext};
use crate::registry::ProtocolFamily;
use crate::transport::WireRequest;
use crate::types::{Message, MessageRole, StreamEvent, Usage};
use crate::Result;

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const MIN_THINKING_BUDGET: u32 = 1024;
const MAX_TEMPERATURE: f64 = 1.0;

/// Anthropic Messages API driver.
#[derive(Debug)]
pub struct AnthropicDriver {
    provider_id: String,
}

impl AnthropicDriver {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }

    /// Extract system messages and the remaining turns separately.
    fn split_system_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut turns: Vec<Value> = Vec::new();

        for m in messages {
            match m.role {
                MessageRole::System => system_parts.push(&m.content),
                MessageRole::User | MessageRole::Assistant => turns.push(json!({
                    "role": m.role.as_str(),
                    "content": [{ "type": "text", "text": m.content }],
                })),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };
        (system, turns)
    }

    /// Half the output budget, at least the API minimum, and strictly below `max_tokens`.
    fn thinking_budget(max_tokens: u32) -> Option<u32> {
        let budget = (max_tokens / 2).max(MIN_THINKING_BUDGET);
        (budget < max_tokens).then_some(budget)
    }

    fn usage(u: &Value) -> Option<Usage> {
        Usage {
            prompt_tokens: u64_at(u, "/input_tokens"),
            completion_tokens: u64_at(u, "/output_tokens"),
            total_tokens: None,
            reasoning_tokens: None,
        }
        .non_empty()
    }
}

impl ProviderDriver for AnthropicDriver {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::AnthropicNative
    }

    fn build_payload(
        &self,
        endpoint: &Endpoint<'_>,
        messages: &[Message],
        config: &ValidatedConfig,
    ) -> Result<WireRequest> {
        let (system, turns) = Self::split_system_messages(messages);
        let max_tokens = config
            .max_tokens()
            .unwrap_or_else(|| DEFAULT_MAX_TOKENS.min(config.max_tokens_ceiling()));

        let mut body = json!({
            "model": config.model_id(),
            "messages": turns,
            "max_tokens": max_tokens,
            "stream": config.stream(),
        });
        if let Some(sys) = system {
            body["system"] = Value::String(sys);
        }
        let budget = config
            .thinking_enabled()
            .then(|| Self::thinking_budget(max_tokens))
            .flatten();
        if let Some(budget) = budget {
            body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
        }
        match config.temperature() {
            // The API rejects a sampling temperature alongside extended thinking.
            Some(_) if budget.is_some() => {
                warn!(model = config.model_id(), "temperature dropped: not accepted with thinking");
            }
            Some(t) if t > MAX_TEMPERATURE => {
                warn!(
                    model = config.model_id(),
                    requested = t,
                    applied = MAX_TEMPERATURE,
                    "temperature above Anthropic range; clamping"
                );
                body["temperature"] = json!(MAX_TEMPERATURE);
            }
            Some(t) => body["temperature"] = json!(t),
            None => {}
        }
        merge_options(&mut body, config.options());

        let mut headers = HashMap::new();
        headers.insert("x-api-key".to_string(), endpoint.api_key.to_string());
        headers.insert("anthropic-version".to_string(), API_VERSION.to_string());

        Ok(WireRequest {
            url: join_url(endpoint.base_url, "/v1/messages"),
            method: "POST".into(),
            headers,
            body,
            stream: config.stream(),
        })
    }

    fn parse_response(&self, body: &Value) -> Result<ParsedResponse> {
        let blocks = body.get("content").and_then(Value::as_array).ok_or_else(|| {
            Error::protocol_with_context(
                &self.provider_id,
                "response has no content array",
                ErrorContext::new()
                    .with_field_path("content")
                    .with_source("anthropic_driver"),
            )
        })?;

        let mut content = String::new();
        let mut thinking = String::new();
        for block in blocks {
            match block.get("type").and_then(Value::as_str) {
                Some("text") => content.push_str(str_at(block, "/text").unwrap_or_default()),
                Some("thinking") => {
                    thinking.push_str(str_at(block, "/thinking").unwrap_or_default())
                }
                _ => {}
            }
        }

        Ok(ParsedResponse {
            content,
            thinking: (!thinking.is_empty()).then_some(thinking),
            usage: body
                .get("usage")
                .and_then(Self::usage)
                .map(Usage::finalize),
        })
    }

    fn parse_stream_event(&self, data: &str) -> Result<Vec<StreamEvent>> {
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let v = parse_json(&self.provider_id, data)?;

        let events = match v.get("type").and_then(Value::as_str).unwrap_or("") {
            "message_start" => v
                .pointer("/message/usage")
                .and_then(Self::usage)
                .map(StreamEvent::UsageFinal)
                .into_iter()
                .collect(),
            "content_block_delta" => match str_at(&v, "/delta/type") {
                Some("text_delta") => str_at(&v, "/delta/text")
                    .filter(|t| !t.is_empty())
                    .map(|t| StreamEvent::ContentDelta(t.to_string()))
                    .into_iter()
                    .collect(),
                Some("thinking_delta") => str_at(&v, "/delta/thinking")
                    .filter(|t| !t.is_empty())
                    .map(|t| StreamEvent::ThinkingDelta(t.to_string()))
                    .into_iter()
                    .collect(),
                _ => Vec::new(),
            },
            "message_delta" => v
                .get("usage")
                .and_then(Self::usage)
                .map(StreamEvent::UsageFinal)
                .into_iter()
                .collect(),
            "message_stop" => vec![StreamEvent::Done],
            "error" => return Err(from_stream_payload(&self.provider_id, &v)),
            // ping, content_block_start/stop, and anything newer.
            _ => Vec::new(),
        };
        Ok(events)
    }
}
