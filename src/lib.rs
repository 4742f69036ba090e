//! # unified-llm
//!
//! 统一的多厂商大模型调用层：一个入口，按模型能力校验请求，路由到各厂商原生协议，
//! 并把响应（包括流式输出与思考内容）规范化为统一结构。
//!
//! Provider abstraction and request dispatch for large language model APIs.
//!
//! ## Overview
//!
//! A caller names a model and hands over provider-agnostic messages plus a
//! [`RequestConfig`]. The crate resolves the model in an immutable
//! [`ModelRegistry`], checks the options against the model's declared
//! capabilities, translates the request into the provider's wire protocol,
//! sends it, and normalizes the answer into a [`UnifiedResponse`] or a live
//! stream of [`StreamEvent`]s.
//!
//! ## Core Philosophy
//!
//! - **Capability-checked**: invalid options fail before any network call
//! - **Family-driven**: one driver per wire protocol family, providers are registry entries
//! - **Streaming-first**: a finite event sequence with exactly one terminal event
//! - **Honest errors**: provider status and codes are preserved, never swallowed
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use unified_llm::{Message, RequestConfig, StreamEvent, UnifiedClient};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> unified_llm::Result<()> {
//!     let client = UnifiedClient::builder()
//!         .api_key("openai", "sk-...")
//!         .build()?;
//!
//!     let messages = vec![Message::user("Hello, how are you?")];
//!     let config = RequestConfig::new("gpt-4o").temperature(0.7);
//!
//!     let response = client.generate(&messages, &config).await?;
//!     println!("{}", response.content);
//!
//!     let mut stream = client.generate_stream(&messages, &config).await?;
//!     while let Some(event) = stream.next().await {
//!         if let StreamEvent::ContentDelta(text) = event {
//!             print!("{}", text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | Provider/model capability metadata |
//! | [`client`] | Unified client, builder, validation and error mapping |
//! | [`drivers`] | Per-protocol-family request/response translation |
//! | [`transport`] | HTTP transport with timeout and proxy support |
//! | [`pipeline`] | SSE decoding and stream normalization |
//! | [`types`] | Messages, request config, responses and stream events |
//! | [`error`] / [`error_class`] | Error taxonomy and provider error classes |

pub mod client;
pub mod drivers;
pub mod error_class;
pub mod pipeline;
pub mod registry;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use client::{CancelHandle, Credentials, EventStream, UnifiedClient, UnifiedClientBuilder};
pub use error_class::ErrorClass;
pub use registry::{ModelDescriptor, ModelRegistry, ProtocolFamily, ProviderDescriptor};
pub use transport::{ProxyConfig, ProxyKind, TransportConfig};
pub use types::{
    Message, MessageRole, RequestConfig, StreamError, StreamEvent, UnifiedResponse, Usage,
};

use futures::Stream;
use std::pin::Pin;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// A specialized Result for pipeline operations
pub type PipeResult<T> = std::result::Result<T, Error>;

/// A unified pinned, boxed stream that emits `PipeResult<T>`
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = PipeResult<T>> + Send + 'a>>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext, ErrorKind};
