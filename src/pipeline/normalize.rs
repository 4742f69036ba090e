//! Stream normalization: SSE frames -> canonical [`StreamEvent`]s.
//!
//! Drivers translate frames one at a time and know nothing about ordering. The
//! normalizer owns the stream contract:
//!
//! - empty deltas are dropped, and thinking deltas are dropped unless thinking is enabled;
//! - usage reports are merged and emitted once, finalized, immediately before `Done`;
//! - exactly one terminal event (`Done` or `Error`) ends the stream;
//! - a connection that ends without the provider's completion signal yields a
//!   `Transport` error, never a silent `Done`;
//! - the raw stream is dropped as soon as the terminal event is queued.

use futures::{stream, StreamExt};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use super::decode::SseFrame;
use super::EventBoxStream;
use crate::drivers::ProviderDriver;
use crate::types::{StreamError, StreamEvent, Usage};
use crate::{BoxStream, Error};

struct Normalizer {
    frames: Option<BoxStream<'static, SseFrame>>,
    driver: Arc<dyn ProviderDriver>,
    thinking: bool,
    usage: Option<Usage>,
    queue: VecDeque<StreamEvent>,
    finished: bool,
}

impl Normalizer {
    fn accept(&mut self, event: StreamEvent) {
        if self.finished {
            return;
        }
        match event {
            StreamEvent::ContentDelta(text) if !text.is_empty() => {
                self.queue.push_back(StreamEvent::ContentDelta(text));
            }
            StreamEvent::ThinkingDelta(text) if self.thinking && !text.is_empty() => {
                self.queue.push_back(StreamEvent::ThinkingDelta(text));
            }
            StreamEvent::ContentDelta(_) | StreamEvent::ThinkingDelta(_) => {}
            StreamEvent::UsageFinal(report) => match &mut self.usage {
                Some(usage) => usage.merge(report),
                None => self.usage = Some(report),
            },
            StreamEvent::Done => {
                if let Some(usage) = self.usage.take() {
                    self.queue.push_back(StreamEvent::UsageFinal(usage.finalize()));
                }
                self.queue.push_back(StreamEvent::Done);
                self.terminate();
                debug!(provider = self.driver.provider_id(), "stream completed");
            }
            StreamEvent::Error(err) => {
                self.queue.push_back(StreamEvent::Error(err));
                self.terminate();
            }
        }
    }

    fn fail(&mut self, err: &Error) {
        warn!(provider = self.driver.provider_id(), error = %err, "stream failed");
        self.accept(StreamEvent::Error(StreamError::from(err)));
    }

    fn terminate(&mut self) {
        self.finished = true;
        // Releases the underlying connection.
        self.frames = None;
    }
}

/// Turn decoded frames into the canonical event sequence using `driver`.
///
/// `thinking` is whether reasoning text may reach the caller.
pub fn normalize(
    frames: BoxStream<'static, SseFrame>,
    driver: Arc<dyn ProviderDriver>,
    thinking: bool,
) -> EventBoxStream {
    let state = Normalizer {
        frames: Some(frames),
        driver,
        thinking,
        usage: None,
        queue: VecDeque::new(),
        finished: false,
    };

    let events = stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.queue.pop_front() {
                return Some((event, st));
            }
            if st.finished {
                return None;
            }
            let frames = st.frames.as_mut()?;
            let next = frames.next().await;
            match next {
                Some(Ok(frame)) => {
                    trace!(event = ?frame.event, bytes = frame.data.len(), "sse frame");
                    match st.driver.parse_stream_event(&frame.data) {
                        Ok(events) => events.into_iter().for_each(|e| st.accept(e)),
                        Err(e) => st.fail(&e),
                    }
                }
                Some(Err(e)) => st.fail(&e),
                None => st.fail(&Error::transport_msg(
                    "connection closed before the provider signalled completion",
                )),
            }
        }
    });
    Box::pin(events)
}
