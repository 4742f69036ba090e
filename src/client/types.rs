//! Live stream handle returned by [`UnifiedClient::generate_stream`](crate::client::UnifiedClient::generate_stream).

use futures::task::AtomicWaker;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use crate::pipeline::{self, EventBoxStream};
use crate::types::{StreamEvent, UnifiedResponse};
use crate::Result;

struct Shared {
    stream: Mutex<Option<EventBoxStream>>,
    waker: AtomicWaker,
    cancelled: AtomicBool,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<EventBoxStream>> {
        // A panic while polling leaves nothing worth protecting.
        self.stream.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Cancels a live [`EventStream`] from anywhere, including another task.
///
/// Cancelling drops the underlying connection immediately; the stream then ends
/// without yielding further events.
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if self.shared.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        let dropped = self.shared.slot().take();
        drop(dropped);
        self.shared.waker.wake();
        tracing::debug!("stream cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Canonical event stream for one call.
///
/// Yields [`StreamEvent`]s ending with exactly one `Done` or `Error`, unless
/// cancelled first. Dropping it releases the connection.
pub struct EventStream {
    shared: Arc<Shared>,
    provider: String,
    model: String,
    request_id: String,
}

impl EventStream {
    pub(crate) fn new(
        events: EventBoxStream,
        provider: impl Into<String>,
        model: impl Into<String>,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                stream: Mutex::new(Some(events)),
                waker: AtomicWaker::new(),
                cancelled: AtomicBool::new(false),
            }),
            provider: provider.into(),
            model: model.into(),
            request_id: request_id.into(),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: self.shared.clone(),
        }
    }

    /// Consume the stream into a single response.
    ///
    /// A terminal `Error` event becomes the returned error, with the same kind.
    pub async fn collect_response(mut self) -> Result<UnifiedResponse> {
        let parsed = pipeline::collect(&mut self).await?;
        Ok(UnifiedResponse {
            content: parsed.content,
            thinking: parsed.thinking,
            provider: self.provider,
            model: self.model,
            usage: parsed.usage,
            request_id: self.request_id,
        })
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<StreamEvent>> {
        self.shared.waker.register(cx.waker());
        let mut slot = self.shared.slot();
        let Some(events) = slot.as_mut() else {
            return Poll::Ready(None);
        };
        match events.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                *slot = None;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};
    use std::time::Duration;

    fn pending_after(first: StreamEvent) -> EventBoxStream {
        Box::pin(stream::once(async move { first }).chain(stream::pending()))
    }

    #[tokio::test]
    async fn cancel_wakes_a_waiting_consumer() {
        let mut events = EventStream::new(
            pending_after(StreamEvent::ContentDelta("a".into())),
            "openai",
            "gpt-4o",
            "req-1",
        );
        let handle = events.cancel_handle();
        assert_eq!(events.next().await, Some(StreamEvent::ContentDelta("a".into())));

        let waiter = tokio::spawn(async move { events.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();
        let next = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("consumer was not woken")
            .unwrap();
        assert_eq!(next, None);
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn collect_response_carries_call_identity() {
        let events = EventStream::new(
            Box::pin(stream::iter(vec![
                StreamEvent::ContentDelta("Hi".into()),
                StreamEvent::Done,
            ])),
            "anthropic",
            "claude-3-5-sonnet-20241022",
            "req-2",
        );
        let resp = events.collect_response().await.unwrap();
        assert_eq!(resp.content, "Hi");
        assert_eq!(resp.provider, "anthropic");
        assert_eq!(resp.request_id, "req-2");
        assert_eq!(resp.usage, None);
    }
}
