//! 能力校验：在任何网络调用之前，按模型声明的能力检查请求选项。
//!
//! Capability validation.
//!
//! Runs before any network call and produces an immutable [`ValidatedConfig`];
//! drivers trust it and never re-validate. Rules, in order:
//!
//! 1. `stream_only` models are forced onto the streaming path.
//! 2. Streaming on a model without streaming support is rejected.
//! 3. A temperature on a model without temperature support is rejected;
//!    otherwise it must lie in `0.0..=2.0`.
//! 4. `show_thinking` on a model without thinking support is accepted and ignored.
//! 5. `max_tokens` above the model ceiling is clamped; zero is rejected.

use serde_json::{Map, Value};
use tracing::warn;

use crate::registry::ModelDescriptor;
use crate::types::RequestConfig;
use crate::{Error, ErrorContext, Result};

const TEMPERATURE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=2.0;

/// Non-fatal change the validator applied to the caller's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    /// Non-streaming request on a stream-only model; delivered via streaming and collected.
    StreamingForced,
    MaxTokensClamped { requested: u32, applied: u32 },
    /// `show_thinking` requested on a model without thinking; `thinking` will stay empty.
    ThinkingUnavailable,
}

/// Request options after capability checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedConfig {
    model_id: String,
    stream: bool,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    max_tokens_ceiling: u32,
    thinking: bool,
    reasoning_model: bool,
    options: Map<String, Value>,
    adjustments: Vec<Adjustment>,
}

impl ValidatedConfig {
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Whether the wire request uses the provider's streaming mode.
    pub fn stream(&self) -> bool {
        self.stream
    }

    pub fn temperature(&self) -> Option<f64> {
        self.temperature
    }

    /// Requested output limit after clamping; `None` when the caller did not set one.
    pub fn max_tokens(&self) -> Option<u32> {
        self.max_tokens
    }

    /// The model's declared output ceiling.
    pub fn max_tokens_ceiling(&self) -> u32 {
        self.max_tokens_ceiling
    }

    /// Thinking was requested and the model supports it.
    pub fn thinking_enabled(&self) -> bool {
        self.thinking
    }

    /// The model is flagged `is_reasoning_model` in the registry.
    pub fn is_reasoning_model(&self) -> bool {
        self.reasoning_model
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    pub fn was_clamped(&self) -> bool {
        self.adjustments
            .iter()
            .any(|a| matches!(a, Adjustment::MaxTokensClamped { .. }))
    }

    pub fn streaming_forced(&self) -> bool {
        self.adjustments.contains(&Adjustment::StreamingForced)
    }
}

/// Check `config` against `model`'s declared capabilities.
pub fn check(config: &RequestConfig, model: &ModelDescriptor) -> Result<ValidatedConfig> {
    let mut adjustments = Vec::new();

    let mut stream = config.stream;
    if !stream && model.stream_only {
        warn!(model = %model.id, "model is stream-only; forcing streaming delivery");
        stream = true;
        adjustments.push(Adjustment::StreamingForced);
    }

    if config.stream && !model.supports_streaming {
        return Err(Error::unsupported_option(
            "stream",
            &model.id,
            "model does not support streaming responses",
        ));
    }

    if let Some(t) = config.temperature {
        if !model.supports_temperature {
            return Err(Error::unsupported_option(
                "temperature",
                &model.id,
                "model does not accept a sampling temperature",
            ));
        }
        if !TEMPERATURE_RANGE.contains(&t) {
            return Err(Error::invalid_request(
                format!("temperature {} is outside 0.0..=2.0", t),
                ErrorContext::new()
                    .with_field_path("config.temperature")
                    .with_source("capability_validator"),
            ));
        }
    }

    let thinking = config.show_thinking && model.supports_thinking;
    if config.show_thinking && !model.supports_thinking {
        adjustments.push(Adjustment::ThinkingUnavailable);
    }

    let max_tokens = match config.max_tokens {
        Some(0) => {
            return Err(Error::invalid_request(
                "max_tokens must be greater than zero",
                ErrorContext::new()
                    .with_field_path("config.max_tokens")
                    .with_source("capability_validator"),
            ))
        }
        Some(requested) if requested > model.max_tokens => {
            warn!(
                model = %model.id,
                requested,
                applied = model.max_tokens,
                "max_tokens exceeds model ceiling; clamping"
            );
            adjustments.push(Adjustment::MaxTokensClamped {
                requested,
                applied: model.max_tokens,
            });
            Some(model.max_tokens)
        }
        other => other,
    };

    Ok(ValidatedConfig {
        model_id: model.id.clone(),
        stream,
        temperature: config.temperature,
        max_tokens,
        max_tokens_ceiling: model.max_tokens,
        thinking,
        reasoning_model: model.is_reasoning_model,
        options: config.options.clone(),
        adjustments,
    })
}
