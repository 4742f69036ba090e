//! Unified response and usage statistics.

use serde::{Deserialize, Serialize};

/// Provider-supplied token counts.
///
/// Every field is optional: a provider that omits a count leaves it `None`. A zero
/// here always means the provider reported zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

impl Usage {
    pub fn is_empty(&self) -> bool {
        self.prompt_tokens.is_none()
            && self.completion_tokens.is_none()
            && self.total_tokens.is_none()
            && self.reasoning_tokens.is_none()
    }

    /// Fold a later report into this one; fields present in `later` win.
    pub fn merge(&mut self, later: Usage) {
        if later.prompt_tokens.is_some() {
            self.prompt_tokens = later.prompt_tokens;
        }
        if later.completion_tokens.is_some() {
            self.completion_tokens = later.completion_tokens;
        }
        if later.total_tokens.is_some() {
            self.total_tokens = later.total_tokens;
        }
        if later.reasoning_tokens.is_some() {
            self.reasoning_tokens = later.reasoning_tokens;
        }
    }

    /// Fill `total_tokens` from prompt + completion when the provider left it out
    /// but reported both parts. Stays `None` if the sum overflows.
    pub fn finalize(mut self) -> Self {
        if self.total_tokens.is_none() {
            if let (Some(p), Some(c)) = (self.prompt_tokens, self.completion_tokens) {
                self.total_tokens = p.checked_add(c);
            }
        }
        self
    }

    /// `None` when nothing was reported at all.
    pub fn non_empty(self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// The complete result of one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedResponse {
    pub content: String,
    /// Present only when thinking was requested, the model supports it, and the
    /// provider actually returned reasoning text.
    pub thinking: Option<String>,
    pub provider: String,
    pub model: String,
    pub usage: Option<Usage>,
    /// Per-call correlation id (UUID v4), also attached to the call's tracing span.
    pub request_id: String,
}
