//! Serde shape of a registry source (YAML or JSON).
//!
//! ```yaml
//! providers:
//!   openai:
//!     name: OpenAI
//!     base_url: https://api.openai.com/v1
//!     uses_openai_protocol: true
//!     supports_streaming: true
//!     supports_mcp: false
//!     models:
//!       gpt-4o:
//!         name: GPT-4o
//!         max_tokens: 128000
//!         supports_temperature: true
//!         supports_streaming: true
//!         supports_thinking: false
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySource {
    pub providers: BTreeMap<String, ProviderSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSource {
    pub name: String,
    pub base_url: String,
    #[serde(default)]
    pub uses_openai_protocol: bool,
    /// Explicit protocol family (`openai`, `anthropic`, `google`, `dashscope`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    pub supports_streaming: bool,
    #[serde(default)]
    pub supports_mcp: bool,
    pub models: BTreeMap<String, ModelSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSource {
    pub name: String,
    pub max_tokens: u32,
    pub supports_temperature: bool,
    pub supports_streaming: bool,
    pub supports_thinking: bool,
    #[serde(default)]
    pub stream_only: bool,
    #[serde(default)]
    pub is_reasoning_model: bool,
}
