//! 厂商错误分类：把各厂商的错误码/HTTP 状态归一为少量规范类别。
//!
//! Canonical classes for provider-reported failures.
//!
//! Every provider spells its error codes differently (`rate_limit_exceeded`,
//! `rate_limit_error`, `RESOURCE_EXHAUSTED`, `Throttling`, ...). [`ErrorClass`]
//! folds them into a small set so callers can decide on backoff without knowing
//! which vendor produced the failure. The provider's own status and code are
//! always preserved next to the class on [`crate::Error::ProviderReported`].
//!
//! ```rust
//! use unified_llm::error_class::ErrorClass;
//!
//! let class = ErrorClass::from_provider_code("Throttling.RateQuota").unwrap();
//! assert_eq!(class, ErrorClass::RateLimited);
//! assert!(class.retryable());
//! assert_eq!(ErrorClass::from_http_status(529), ErrorClass::Overloaded);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Malformed request, invalid parameters, or rejected content.
    InvalidRequest,
    /// Invalid, expired, or missing API key.
    Authentication,
    /// Valid credentials but insufficient permissions.
    PermissionDenied,
    /// Model or endpoint does not exist on the provider side.
    NotFound,
    /// Input exceeds the context window or payload limit.
    RequestTooLarge,
    RateLimited,
    /// Account usage quota or billing limit reached.
    QuotaExhausted,
    ServerError,
    Overloaded,
    /// Provider-side deadline exceeded (reported by the provider, not our own timeout).
    Timeout,
    Unknown,
}

impl ErrorClass {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::Authentication => "authentication",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::RequestTooLarge => "request_too_large",
            Self::RateLimited => "rate_limited",
            Self::QuotaExhausted => "quota_exhausted",
            Self::ServerError => "server_error",
            Self::Overloaded => "overloaded",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Advisory only: nothing in this crate retries. Callers own the retry policy.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::ServerError | Self::Overloaded | Self::Timeout
        )
    }

    /// Returns `"client"`, `"rate"`, `"server"` or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidRequest
            | Self::Authentication
            | Self::PermissionDenied
            | Self::NotFound
            | Self::RequestTooLarge => "client",
            Self::RateLimited | Self::QuotaExhausted => "rate",
            Self::ServerError | Self::Overloaded | Self::Timeout => "server",
            Self::Unknown => "unknown",
        }
    }

    /// Maps a provider error code/type/status string to a class.
    ///
    /// Covers the OpenAI `error.code`/`error.type`, Anthropic `error.type`,
    /// Google `error.status` and DashScope `code` vocabularies.
    pub fn from_provider_code(provider_code: &str) -> Option<Self> {
        let class = match provider_code {
            "invalid_request" | "invalid_request_error" | "INVALID_ARGUMENT"
            | "FAILED_PRECONDITION" | "InvalidParameter" | "DataInspectionFailed" => {
                Self::InvalidRequest
            }
            "authentication" | "authentication_error" | "invalid_api_key" | "UNAUTHENTICATED"
            | "InvalidApiKey" => Self::Authentication,
            "permission_denied" | "permission_error" | "PERMISSION_DENIED" | "AccessDenied" => {
                Self::PermissionDenied
            }
            "not_found" | "not_found_error" | "model_not_found" | "NOT_FOUND"
            | "ModelNotFound" => Self::NotFound,
            "request_too_large" | "context_length_exceeded" => Self::RequestTooLarge,
            "rate_limited" | "rate_limit_exceeded" | "rate_limit_error" | "RESOURCE_EXHAUSTED"
            | "Throttling" | "Throttling.RateQuota" => Self::RateLimited,
            "quota_exhausted" | "insufficient_quota" | "Arrearage"
            | "Throttling.AllocationQuota" => Self::QuotaExhausted,
            "server_error" | "api_error" | "INTERNAL" | "InternalError" => Self::ServerError,
            "overloaded" | "overloaded_error" | "UNAVAILABLE" => Self::Overloaded,
            "timeout" | "DEADLINE_EXCEEDED" => Self::Timeout,
            _ => return None,
        };
        Some(class)
    }

    /// Maps an HTTP status code to the most likely class.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::InvalidRequest,
            401 => Self::Authentication,
            403 => Self::PermissionDenied,
            404 => Self::NotFound,
            408 => Self::Timeout,
            413 => Self::RequestTooLarge,
            // 429 is also used for exhausted quota; the provider code refines it when present.
            429 => Self::RateLimited,
            500 | 502 => Self::ServerError,
            503 | 529 => Self::Overloaded,
            504 => Self::Timeout,
            _ => Self::Unknown,
        }
    }

    /// Provider code wins over HTTP status when both are known.
    pub fn classify(status: Option<u16>, provider_code: Option<&str>) -> Self {
        provider_code
            .and_then(Self::from_provider_code)
            .or_else(|| status.map(Self::from_http_status))
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
