//! 类型系统模块：消息、请求配置、统一响应与流式事件。
//!
//! # Types Module
//!
//! Call-scoped data: created per request, consumed by the caller, never persisted.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and text content |
//! | [`RequestConfig`] | Per-call model selection and generation options |
//! | [`UnifiedResponse`] | Complete result of a generation call |
//! | [`Usage`] | Provider-reported token counts (each may be absent) |
//! | [`StreamEvent`] | Canonical streaming event with a terminal contract |
//!
//! ```rust
//! use unified_llm::types::{Message, RequestConfig};
//!
//! let messages = vec![
//!     Message::system("You are a helpful assistant"),
//!     Message::user("What's the weather?"),
//! ];
//! let config = RequestConfig::new("gpt-4o").temperature(0.7).max_tokens(256);
//! assert_eq!(messages.len(), 2);
//! assert_eq!(config.max_tokens, Some(256));
//! ```

pub mod events;
pub mod message;
pub mod request;
pub mod response;

pub use events::{StreamError, StreamEvent};
pub use message::{Message, MessageRole};
pub use request::RequestConfig;
pub use response::{UnifiedResponse, Usage};
