use crate::error_class::ErrorClass;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "providers.openai.models.gpt-4o.max_tokens", "config.temperature")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "registry_loader", "openai_driver")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// The kind of a failure, preserved across every layer (including stream `Error` events).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownModel,
    UnsupportedOption,
    InvalidRequest,
    Configuration,
    Transport,
    Timeout,
    ProviderProtocol,
    ProviderReported,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownModel => "unknown_model",
            Self::UnsupportedOption => "unsupported_option",
            Self::InvalidRequest => "invalid_request",
            Self::Configuration => "configuration",
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::ProviderProtocol => "provider_protocol",
            Self::ProviderReported => "provider_reported",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for provider dispatch.
///
/// Every failure, whichever stage detects it, surfaces as exactly one of these
/// variants; [`Error::kind`] gives the flat taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Unknown model '{model}'{}", format_available(.available))]
    UnknownModel {
        model: String,
        /// Provider filter in effect during resolution, if any.
        provider: Option<String>,
        available: Vec<String>,
    },

    #[error("Option '{option}' is not supported by model '{model}': {reason}")]
    UnsupportedOption {
        option: String,
        model: String,
        reason: String,
    },

    #[error("Invalid request: {message}{}", format_context(.context))]
    InvalidRequest {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    },

    #[error("Request timed out{}: {message}", format_timeout(.timeout))]
    Timeout {
        timeout: Option<Duration>,
        message: String,
    },

    #[error("Provider protocol error ({provider}): {message}{}", format_context(.context))]
    ProviderProtocol {
        provider: String,
        message: String,
        context: ErrorContext,
    },

    #[error("Provider error from {provider}{} ({class}): {message}", format_status(.status, .code))]
    ProviderReported {
        provider: String,
        status: Option<u16>,
        code: Option<String>,
        class: ErrorClass,
        message: String,
        retry_after_ms: Option<u64>,
    },
}

fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_available(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(" (available: {})", available.join(", "))
    }
}

fn format_timeout(timeout: &Option<Duration>) -> String {
    match timeout {
        Some(t) => format!(" after {:?}", t),
        None => String::new(),
    }
}

fn format_status(status: &Option<u16>, code: &Option<String>) -> String {
    match (status, code) {
        (Some(s), Some(c)) => format!(": HTTP {} [{}]", s, c),
        (Some(s), None) => format!(": HTTP {}", s),
        (None, Some(c)) => format!(" [{}]", c),
        (None, None) => String::new(),
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownModel { .. } => ErrorKind::UnknownModel,
            Error::UnsupportedOption { .. } => ErrorKind::UnsupportedOption,
            Error::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Error::Configuration { .. } => ErrorKind::Configuration,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Timeout { .. } => ErrorKind::Timeout,
            Error::ProviderProtocol { .. } => ErrorKind::ProviderProtocol,
            Error::ProviderReported { .. } => ErrorKind::ProviderReported,
        }
    }

    pub fn unsupported_option(
        option: impl Into<String>,
        model: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::UnsupportedOption {
            option: option.into(),
            model: model.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidRequest {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    /// Connection-level failure with the underlying cause preserved.
    pub fn transport<E>(msg: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Transport {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn transport_msg(msg: impl Into<String>) -> Self {
        Error::Transport {
            message: msg.into(),
            source: None,
        }
    }

    pub fn protocol(provider: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::protocol_with_context(provider, msg, ErrorContext::new())
    }

    pub fn protocol_with_context(
        provider: impl Into<String>,
        msg: impl Into<String>,
        context: ErrorContext,
    ) -> Self {
        Error::ProviderProtocol {
            provider: provider.into(),
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::InvalidRequest { context, .. }
            | Error::Configuration { context, .. }
            | Error::ProviderProtocol { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Whether a caller-side retry may succeed. Nothing in this crate acts on it.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { .. } | Error::Timeout { .. } => true,
            Error::ProviderReported { class, .. } => class.retryable(),
            _ => false,
        }
    }

    /// Provider-supplied retry hint, when present.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::ProviderReported {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}
