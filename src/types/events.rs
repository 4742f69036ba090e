//! Canonical streaming events.
//!
//! A stream is an ordered, finite, non-restartable sequence of [`StreamEvent`]s that
//! ends with exactly one terminal event: [`StreamEvent::Done`] or [`StreamEvent::Error`].

use crate::error::{Error, ErrorKind};
use crate::error_class::ErrorClass;
use serde::{Deserialize, Serialize};

use super::response::Usage;

/// Unified streaming event enum
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "data")]
pub enum StreamEvent {
    /// Incremental answer text.
    ContentDelta(String),
    /// Incremental reasoning text.
    ThinkingDelta(String),
    /// Provider-reported token counts. Emitted at most once, right before `Done`.
    UsageFinal(Usage),
    /// The provider signalled completion.
    Done,
    /// The stream failed; no further events follow.
    Error(StreamError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error(_))
    }
}

/// Error payload carried by a terminal [`StreamEvent::Error`].
///
/// Keeps the error kind and the provider-supplied status/code so a collected
/// stream fails with the same [`ErrorKind`] a non-streaming call would.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<ErrorClass>,
}

impl StreamError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
            status: None,
            code: None,
            class: None,
        }
    }

    /// Rebuild an [`Error`] of the same kind. Underlying sources do not survive the trip.
    pub fn into_error(self) -> Error {
        match self.kind {
            ErrorKind::Transport => Error::transport_msg(self.message),
            ErrorKind::Timeout => Error::Timeout {
                timeout: None,
                message: self.message,
            },
            ErrorKind::ProviderProtocol => {
                Error::protocol(self.provider.unwrap_or_default(), self.message)
            }
            ErrorKind::ProviderReported => Error::ProviderReported {
                class: self
                    .class
                    .unwrap_or_else(|| ErrorClass::classify(self.status, self.code.as_deref())),
                provider: self.provider.unwrap_or_default(),
                status: self.status,
                code: self.code,
                message: self.message,
                retry_after_ms: None,
            },
            // Resolution fails before a stream exists; kept so every kind converts.
            ErrorKind::UnknownModel => Error::UnknownModel {
                model: self.code.unwrap_or_default(),
                provider: self.provider,
                available: Vec::new(),
            },
            ErrorKind::UnsupportedOption => Error::unsupported_option(
                self.code.unwrap_or_default(),
                String::new(),
                self.message,
            ),
            ErrorKind::InvalidRequest => {
                Error::invalid_request(self.message, Default::default())
            }
            ErrorKind::Configuration => Error::configuration(self.message),
        }
    }
}

impl From<&Error> for StreamError {
    fn from(err: &Error) -> Self {
        let mut out = StreamError::new(err.kind(), err.to_string());
        match err {
            Error::ProviderReported {
                provider,
                status,
                code,
                class,
                message,
                ..
            } => {
                out.message = message.clone();
                out.provider = Some(provider.clone());
                out.status = *status;
                out.code = code.clone();
                out.class = Some(*class);
            }
            Error::ProviderProtocol {
                provider, message, ..
            } => {
                out.message = message.clone();
                out.provider = Some(provider.clone());
            }
            Error::Transport { message, .. } | Error::Timeout { message, .. } => {
                out.message = message.clone();
            }
            Error::UnknownModel {
                model, provider, ..
            } => {
                out.code = Some(model.clone());
                out.provider = provider.clone();
            }
            Error::UnsupportedOption { option, reason, .. } => {
                out.message = reason.clone();
                out.code = Some(option.clone());
            }
            _ => {}
        }
        out
    }
}
