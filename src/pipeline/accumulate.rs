//! Stream collection: fold canonical events back into a single response.
//!
//! Used for stream-only models called without streaming, and by
//! [`EventStream::collect_response`](crate::client::EventStream::collect_response).

use futures::{Stream, StreamExt};

use crate::drivers::ParsedResponse;
use crate::types::StreamEvent;
use crate::{Error, Result};

/// Running totals of a stream being collected.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    content: String,
    thinking: String,
    usage: Option<crate::types::Usage>,
    done: bool,
}

impl ResponseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event. Returns `Ok(true)` once `Done` has been seen; an `Error`
    /// event becomes the error of the whole collection.
    pub fn push(&mut self, event: StreamEvent) -> Result<bool> {
        match event {
            StreamEvent::ContentDelta(text) => self.content.push_str(&text),
            StreamEvent::ThinkingDelta(text) => self.thinking.push_str(&text),
            StreamEvent::UsageFinal(usage) => self.usage = Some(usage),
            StreamEvent::Done => self.done = true,
            StreamEvent::Error(err) => return Err(err.into_error()),
        }
        Ok(self.done)
    }

    pub fn finish(self) -> Result<ParsedResponse> {
        if !self.done {
            return Err(Error::transport_msg(
                "stream ended without a completion signal",
            ));
        }
        Ok(ParsedResponse {
            content: self.content,
            thinking: (!self.thinking.is_empty()).then_some(self.thinking),
            usage: self.usage,
        })
    }
}

/// Drain `events` into a [`ParsedResponse`]. Stops at the first terminal event.
pub async fn collect<S>(mut events: S) -> Result<ParsedResponse>
where
    S: Stream<Item = StreamEvent> + Unpin,
{
    let mut acc = ResponseAccumulator::new();
    while let Some(event) = events.next().await {
        if acc.push(event)? {
            break;
        }
    }
    acc.finish()
}
