//! 流水线处理模块：把原始字节流转换为统一的流式事件。
//!
//! # Streaming Pipeline
//!
//! Every streaming call runs the same three stages, whatever the provider:
//!
//! ```text
//! Raw Bytes → decode (SSE frames) → normalize (driver + contract) → StreamEvent
//!                                                   │
//!                                             accumulate (optional,
//!                                             stream → response)
//! ```
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`decode`] | SSE framing over a byte stream |
//! | [`normalize`] | Driver translation plus the terminal/usage contract |
//! | [`accumulate`] | Collect events into a single response |

pub mod accumulate;
pub mod decode;
pub mod normalize;

use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;

use crate::drivers::ProviderDriver;
use crate::types::StreamEvent;
use crate::BoxStream;

pub use accumulate::{collect, ResponseAccumulator};
pub use decode::{decode_sse, SseFrame};
pub use normalize::normalize;

/// Canonical event stream. Failures travel as [`StreamEvent::Error`], so items
/// are not wrapped in `Result`.
pub type EventBoxStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send + 'static>>;

/// Full pipeline for one response body.
pub fn event_stream(
    body: BoxStream<'static, Bytes>,
    driver: Arc<dyn ProviderDriver>,
    thinking: bool,
) -> EventBoxStream {
    normalize(decode_sse(body), driver, thinking)
}
