//! DashScope 原生协议驱动 (通义千问)
//!
//! Alibaba DashScope text-generation API. Messages go under `input`, sampling
//! options under `parameters`. With `incremental_output` each stream frame is a
//! delta; the frame whose `finish_reason` is not `"null"` is the last one.

use serde_json::{json, Value};
use std::collections::HashMap;

use super::{
    join_url, merge_options, parse_json, str_at, u64_at, Endpoint, ParsedResponse,
    ProviderDriver,
};
use crate::client::error_classification::from_stream_payload;
use crate::client::validation::ValidatedConfig;
use crate::error::{Error, ErrorContext};
use crate::registry::ProtocolFamily;
use crate::transport::WireRequest;
use crate::types::{Message, StreamEvent, Usage};
use crate::Result;

const GENERATION_PATH: &str = "/services/aigc/text-generation/generation";

#[derive(Debug)]
pub struct DashScopeDriver {
    provider_id: String,
}

impl DashScopeDriver {
    pub fn new(provider_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
        }
    }

    fn usage(u: &Value) -> Option<Usage> {
        Usage {
            prompt_tokens: u64_at(u, "/input_tokens"),
            completion_tokens: u64_at(u, "/output_tokens"),
            total_tokens: u64_at(u, "/total_tokens"),
            reasoning_tokens: u64_at(u, "/output_tokens_details/reasoning_tokens"),
        }
        .non_empty()
    }

    /// DashScope reports failures as a top-level `code` with no `output`.
    fn is_error(v: &Value) -> bool {
        v.get("output").is_none()
            && v.get("code")
                .and_then(Value::as_str)
                .is_some_and(|c| !c.is_empty())
    }

    /// `(content, thinking)` from the message-format output, falling back to the
    /// legacy text format.
    fn texts(v: &Value) -> (Option<&str>, Option<&str>) {
        match v.pointer("/output/choices/0/message") {
            Some(message) => (
                message.get("content").and_then(Value::as_str),
                message.get("reasoning_content").and_then(Value::as_str),
            ),
            None => (str_at(v, "/output/text"), None),
        }
    }

    fn finish_reason(v: &Value) -> Option<&str> {
        str_at(v, "/output/choices/0/finish_reason")
            .or_else(|| str_at(v, "/output/finish_reason"))
            .filter(|r| !r.is_empty() && *r != "null")
    }
}

impl ProviderDriver for DashScopeDriver {
    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn family(&self) -> ProtocolFamily {
        ProtocolFamily::DashScopeNative
    }

    fn build_payload(
        &self,
        endpoint: &Endpoint<'_>,
        messages: &[Message],
        config: &ValidatedConfig,
    ) -> Result<WireRequest> {
        let ds_messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut parameters = json!({ "result_format": "message" });
        if let Some(t) = config.temperature() {
            parameters["temperature"] = json!(t);
        }
        if let Some(mt) = config.max_tokens() {
            parameters["max_tokens"] = json!(mt);
        }
        if config.stream() {
            parameters["incremental_output"] = json!(true);
        }
        if config.thinking_enabled() {
            parameters["enable_thinking"] = json!(true);
        }

        let mut body = json!({
            "model": config.model_id(),
            "input": { "messages": ds_messages },
            "parameters": parameters,
        });
        merge_options(&mut body, config.options());

        let mut headers = HashMap::new();
        headers.insert(
            "authorization".to_string(),
            format!("Bearer {}", endpoint.api_key),
        );
        if config.stream() {
            headers.insert("x-dashscope-sse".to_string(), "enable".to_string());
        }

        Ok(WireRequest {
            url: join_url(endpoint.base_url, GENERATION_PATH),
            method: "POST".into(),
            headers,
            body,
            stream: config.stream(),
        })
    }

    fn parse_response(&self, body: &Value) -> Result<ParsedResponse> {
        if Self::is_error(body) {
            return Err(from_stream_payload(&self.provider_id, body));
        }
        let (content, thinking) = Self::texts(body);
        let content = content.ok_or_else(|| {
            Error::protocol_with_context(
                &self.provider_id,
                "response has neither output.choices[0].message nor output.text",
                ErrorContext::new()
                    .with_field_path("output.choices[0].message.content")
                    .with_source("dashscope_driver"),
            )
        })?;

        Ok(ParsedResponse {
            content: content.to_string(),
            thinking: thinking.filter(|t| !t.is_empty()).map(String::from),
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
        if Self::is_error(&v) {
            return Err(from_stream_payload(&self.provider_id, &v));
        }

        let mut events = Vec::new();
        let (content, thinking) = Self::texts(&v);
        if let Some(t) = thinking.filter(|t| !t.is_empty()) {
            events.push(StreamEvent::ThinkingDelta(t.to_string()));
        }
        if let Some(c) = content.filter(|c| !c.is_empty()) {
            events.push(StreamEvent::ContentDelta(c.to_string()));
        }
        if let Some(usage) = v.get("usage").and_then(Self::usage) {
            events.push(StreamEvent::UsageFinal(usage));
        }
        if Self::finish_reason(&v).is_some() {
            events.push(StreamEvent::Done);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::validated;
    use super::*;
    use crate::error::ErrorKind;
    use crate::error_class::ErrorClass;
    use crate::types::RequestConfig;

    const EP: Endpoint<'static> = Endpoint {
        base_url: "https://dashscope.aliyuncs.com/api/v1",
        api_key: "sk-ds",
    };

    #[test]
    fn build_streaming_payload() {
        let driver = DashScopeDriver::new("qwen");
        let cfg = validated(
            RequestConfig::new("test-model")
                .stream(true)
                .show_thinking(true)
                .temperature(0.5),
            8192,
            true,
        );
        let req = driver
            .build_payload(&EP, &[Message::system("S"), Message::user("Q")], &cfg)
            .unwrap();
        assert_eq!(
            req.url,
            "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation"
        );
        assert_eq!(req.headers["x-dashscope-sse"], "enable");
        assert_eq!(req.headers["authorization"], "Bearer sk-ds");
        assert_eq!(req.body["input"]["messages"][0]["role"], "system");
        assert_eq!(req.body["parameters"]["result_format"], "message");
        assert_eq!(req.body["parameters"]["incremental_output"], true);
        assert_eq!(req.body["parameters"]["enable_thinking"], true);
        assert_eq!(req.body["parameters"]["temperature"], 0.5);
    }

    #[test]
    fn non_streaming_payload_has_no_sse_header() {
        let driver = DashScopeDriver::new("qwen");
        let cfg = validated(RequestConfig::new("test-model"), 8192, false);
        let req = driver.build_payload(&EP, &[Message::user("Q")], &cfg).unwrap();
        assert!(!req.headers.contains_key("x-dashscope-sse"));
        assert!(req.body["parameters"].get("incremental_output").is_none());
        assert!(req.body["parameters"].get("enable_thinking").is_none());
    }

    #[test]
    fn parse_message_and_text_formats() {
        let driver = DashScopeDriver::new("qwen");
        let body = json!({
            "output": {"choices": [{"finish_reason": "stop",
                "message": {"role": "assistant", "content": "Hi", "reasoning_content": "hmm"}}]},
            "usage": {"input_tokens": 5, "output_tokens": 3},
            "request_id": "r1"
        });
        let resp = driver.parse_response(&body).unwrap();
        assert_eq!(resp.content, "Hi");
        assert_eq!(resp.thinking.as_deref(), Some("hmm"));
        assert_eq!(resp.usage.unwrap().total_tokens, Some(8));

        let legacy = json!({"output": {"text": "Hello", "finish_reason": "stop"}});
        assert_eq!(driver.parse_response(&legacy).unwrap().content, "Hello");
    }

    #[test]
    fn error_body_is_provider_reported() {
        let driver = DashScopeDriver::new("qwen");
        let body = json!({"code": "Throttling.RateQuota", "message": "Requests rate limit exceeded", "request_id": "r"});
        match driver.parse_response(&body).unwrap_err() {
            Error::ProviderReported { code, class, .. } => {
                assert_eq!(code.as_deref(), Some("Throttling.RateQuota"));
                assert_eq!(class, ErrorClass::RateLimited);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stream_frames_end_on_finish_reason() {
        let driver = DashScopeDriver::new("qwen");
        let mid = driver
            .parse_stream_event(r#"{"output":{"choices":[{"message":{"content":"","reasoning_content":"let me"},"finish_reason":"null"}]},"usage":{"input_tokens":9,"output_tokens":1}}"#)
            .unwrap();
        assert_eq!(mid[0], StreamEvent::ThinkingDelta("let me".into()));
        assert!(matches!(&mid[1], StreamEvent::UsageFinal(_)));
        assert_eq!(mid.len(), 2);

        let last = driver
            .parse_stream_event(r#"{"output":{"choices":[{"message":{"content":"done"},"finish_reason":"stop"}]},"usage":{"input_tokens":9,"output_tokens":4,"total_tokens":13}}"#)
            .unwrap();
        assert_eq!(last.first(), Some(&StreamEvent::ContentDelta("done".into())));
        assert_eq!(last.last(), Some(&StreamEvent::Done));
    }

    #[test]
    fn malformed_frame_is_protocol_error() {
        let driver = DashScopeDriver::new("qwen");
        let err = driver.parse_stream_event("id:1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderProtocol);
    }
}
