//! Error classification: transport failures and provider error payloads into
//! the unified [`Error`] taxonomy.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use crate::error_class::ErrorClass;
use crate::Error;

const MAX_RAW_MESSAGE: usize = 512;

/// Map a reqwest failure. Timeouts stay distinct from other connection failures.
pub(crate) fn map_reqwest_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        return Error::Timeout {
            timeout: Some(timeout),
            message: err.to_string(),
        };
    }
    let message = if err.is_connect() {
        "failed to connect to provider"
    } else if err.is_body() || err.is_decode() {
        "failed to read response body"
    } else if err.is_request() {
        "failed to send request"
    } else {
        "HTTP request failed"
    };
    Error::transport(message, err)
}

/// Pull `(code, message)` out of the error shapes providers use:
///
/// - OpenAI-compatible: `{"error": {"message", "type", "code"}}`
/// - Anthropic: `{"type": "error", "error": {"type", "message"}}`
/// - Google: `{"error": {"code": 429, "message", "status": "RESOURCE_EXHAUSTED"}}`
/// - DashScope: `{"code": "Throttling", "message", "request_id"}`
pub(crate) fn extract_code_and_message(v: &Value) -> (Option<String>, Option<String>) {
    let str_of = |v: Option<&Value>| v.and_then(|x| x.as_str()).map(String::from);

    match v.get("error") {
        Some(err @ Value::Object(_)) => {
            let code = str_of(err.get("status"))
                .or_else(|| str_of(err.get("code")))
                .or_else(|| str_of(err.get("type")))
                .or_else(|| err.get("code").and_then(|c| c.as_i64()).map(|c| c.to_string()));
            (code, str_of(err.get("message")))
        }
        Some(Value::String(msg)) => (str_of(v.get("code")), Some(msg.clone())),
        _ => (str_of(v.get("code")), str_of(v.get("message"))),
    }
}

fn parse_retry_after(headers: &HashMap<String, String>) -> Option<u64> {
    if let Some(ms) = headers
        .get("retry-after-ms")
        .and_then(|v| v.trim().parse::<f64>().ok())
    {
        return Some(ms.max(0.0) as u64);
    }
    headers
        .get("retry-after")
        .and_then(|v| v.trim().parse::<f64>().ok())
        .map(|secs| (secs.max(0.0) * 1000.0) as u64)
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_RAW_MESSAGE {
        return text.to_string();
    }
    let mut end = MAX_RAW_MESSAGE;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

/// Map a non-2xx HTTP response into [`Error::ProviderReported`], preserving the
/// provider's status and code.
pub fn from_http_response(
    provider: &str,
    status: u16,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> Error {
    let (code, message) = match serde_json::from_slice::<Value>(body) {
        Ok(v) => extract_code_and_message(&v),
        Err(_) => (None, None),
    };
    let message = message.unwrap_or_else(|| {
        let raw = String::from_utf8_lossy(body);
        let raw = raw.trim();
        if raw.is_empty() {
            format!("HTTP {}", status)
        } else {
            truncate(raw)
        }
    });
    Error::ProviderReported {
        provider: provider.to_string(),
        status: Some(status),
        class: ErrorClass::classify(Some(status), code.as_deref()),
        code,
        message,
        retry_after_ms: parse_retry_after(headers),
    }
}

/// Map an error object delivered inside a stream (e.g. Anthropic's `event: error`).
pub fn from_stream_payload(provider: &str, payload: &Value) -> Error {
    let (code, message) = extract_code_and_message(payload);
    Error::ProviderReported {
        provider: provider.to_string(),
        status: None,
        class: ErrorClass::classify(None, code.as_deref()),
        code,
        message: message.unwrap_or_else(|| "provider reported an error mid-stream".into()),
        retry_after_ms: None,
    }
}
