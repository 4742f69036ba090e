//! Gemini Generate API 驱动 — 实现 Google Gemini 特有的请求/响应格式转换
//!
//! Google Gemini generateContent API driver. Key differences:
//! - Uses `contents` instead of `messages`, with `parts` instead of `content`.
//! - Roles: `user` and `model` (not `assistant`). System uses `systemInstruction`.
//! - `generationConfig` wraps temperature and `maxOutputTokens`.
//! - Thinking parts are flagged with `thought: true`.
//! - Streaming (`:streamGenerateContent?alt=sse`) sends full response objects per
//!   frame; the frame carrying `finishReason` is the last one.
//! - The API key travels in the `x-goog-api-key` header.

use serde_json::{json, Value};
use std::collections::HashMap;

use super::{
    join_url, merge_options, parse_json, str_at, u64_at, Endpoint, ParsedResponse,
    ProviderDriver,
};
use crate::client::error_classification::from_stream_payload;
use crate::client::validation::ValidatedConfig;
use crate::error::{Error, ErrorContext};
use crate::error_class::ErrorClass;
use crate::registry::ProtocolFamily;
use crate::transport::WireRequest;
use crate::types::{Message, MessageRole, StreamEvent, Usage};
use crate::Result;

/// Google Gemini generateContent API driver.
#[derive(Debug)]
pub struct GeminiDriver {
    provider_id: String,
}

impl GeminiDriver {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }

    /// Separate system instructions from conversation contents.
    fn split_messages(messages: &[Message]) -> (Option<Value>, Vec<Value>) {
        let mut system_parts: Vec<Value> = Vec::new();
        let mut contents: Vec<Value> = Vec::new();

        for m in messages {
            let role = match m.role {
                MessageRole::System => {
                    system_parts.push(json!({ "text": m.content }));
                    continue;
                }
                MessageRole::User => "user",
                MessageRole::Assistant => "model",
            };
            contents.push(json!({ "role": role, "parts": [{ "text": m.content }] }));
        }

        let system = (!system_parts.is_empty()).then(|| json!({ "parts": system_parts }));
        (system, contents)
    }

    fn usage(u: &Value) -> Option<Usage> {
        Usage {
            prompt_tokens: u64_at(u, "/promptTokenCount"),
            completion_tokens: u64_at(u, "/candidatesTokenCount"),
            total_tokens: u64_at(u, "/totalTokenCount"),
            reasoning_tokens: u64_at(u, "/thoughtsTokenCount"),
        }
        .non_empty()
    }

    /// A prompt rejected by safety filters has no candidates, only `promptFeedback`.
    fn blocked(&self, v: &Value) -> Option<Error> {
        let reason = str_at(v, "/promptFeedback/blockReason")?;
        Some(Error::ProviderReported {
            provider: self.provider_id.clone(),
            status: None,
            code: Some(reason.to_string()),
            class: ErrorClass::InvalidRequest,
            message: format!("prompt blocked by provider: {}", reason),
            retry_after_ms: None,
        })
    }

    /// Text and thought parts of the first candidate, in order.
    fn parts(v: &Value) -> impl Iterator<Item = (bool, &str)> {
        v.pointer("/candidates/0/content/parts")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|p| {
                let text = p.get("text").and_then(Value::as_str)?;
                let thought = p.get("thought").and_then(Value::as_bool).unwrap_or(false);
                Some((thought, text))
            })
    }
}

impl ProviderDriver for GeminiDriver {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::GoogleNative
    }

    fn build_payload(
        &self,
        endpoint: &Endpoint<'_>,
        messages: &[Message],
        config: &ValidatedConfig,
    ) -> Result<WireRequest> {
        let (system, contents) = Self::split_messages(messages);

        let mut generation_config = serde_json::Map::new();
        if let Some(t) = config.temperature() {
            generation_config.insert("temperature".into(), json!(t));
        }
        if let Some(mt) = config.max_tokens() {
            generation_config.insert("maxOutputTokens".into(), json!(mt));
        }
        if config.thinking_enabled() {
            generation_config.insert("thinkingConfig".into(), json!({ "includeThoughts": true }));
        }

        let mut body = json!({ "contents": contents });
        if let Some(sys) = system {
            body["systemInstruction"] = sys;
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }
        merge_options(&mut body, config.options());

        let path = if config.stream() {
            format!("/models/{}:streamGenerateContent?alt=sse", config.model_id())
        } else {
            format!("/models/{}:generateContent", config.model_id())
        };

        let mut headers = HashMap::new();
        headers.insert("x-goog-api-key".to_string(), endpoint.api_key.to_string());

        Ok(WireRequest {
            url: join_url(endpoint.base_url, &path),
            method: "POST".into(),
            headers,
            body,
            stream: config.stream(),
        })
    }

    fn parse_response(&self, body: &Value) -> Result<ParsedResponse> {
        if body.pointer("/candidates/0").is_none() {
            if let Some(err) = self.blocked(body) {
                return Err(err);
            }
            return Err(Error::protocol_with_context(
                &self.provider_id,
                "response has no candidates",
                ErrorContext::new()
                    .with_field_path("candidates[0]")
                    .with_source("gemini_driver"),
            ));
        }

        let mut content = String::new();
        let mut thinking = String::new();
        for (thought, text) in Self::parts(body) {
            if thought {
                thinking.push_str(text);
            } else {
                content.push_str(text);
            }
        }

        Ok(ParsedResponse {
            content,
            thinking: (!thinking.is_empty()).then_some(thinking),
            usage: body
                .get("usageMetadata")
                .and_then(Self::usage)
                .map(Usage::finalize),
        })
    }

    fn parse_stream_event(&self, data: &str) -> Result<Vec<StreamEvent>> {
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let v = parse_json(&self.provider_id, data)?;
        if v.get("error").is_some() {
            return Err(from_stream_payload(&self.provider_id, &v));
        }
        if v.pointer("/candidates/0").is_none() {
            if let Some(err) = self.blocked(&v) {
                return Err(err);
            }
        }

        let mut events: Vec<StreamEvent> = Self::parts(&v)
            .filter(|(_, text)| !text.is_empty())
            .map(|(thought, text)| {
                if thought {
                    StreamEvent::ThinkingDelta(text.to_string())
                } else {
                    StreamEvent::ContentDelta(text.to_string())
                }
            })
            .collect();

        if let Some(usage) = v.get("usageMetadata").and_then(Self::usage) {
            events.push(StreamEvent::UsageFinal(usage));
        }
        if str_at(&v, "/candidates/0/finishReason").is_some() {
            events.push(StreamEvent::Done);
        }
        Ok(events)
    }
}
