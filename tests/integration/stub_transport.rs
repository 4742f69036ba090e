//! Scripted in-memory transport.
//!
//! Records every request, counts calls, and counts how many streaming bodies
//! were released (dropped) so tests can check connection cleanup.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use unified_llm::transport::{RawResponse, RawStreamResponse, Transport, WireRequest};
use unified_llm::{BoxStream, Error, Result, UnifiedClient};

#[derive(Debug, Clone)]
pub enum Part {
    Bytes(Vec<u8>),
    /// The connection fails at this point.
    Fail(String),
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub parts: Vec<Part>,
    /// Keep the body open forever after the scripted parts.
    pub hang: bool,
}

impl Reply {
    pub fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            parts: vec![Part::Bytes(body.as_bytes().to_vec())],
            hang: false,
        }
    }

    /// One SSE body delivered as a single chunk.
    pub fn sse(body: &str) -> Self {
        Self::json(200, body)
    }

    /// One SSE body cut into chunks at the given byte offsets.
    pub fn sse_split(body: &str, cuts: &[usize]) -> Self {
        let bytes = body.as_bytes();
        let mut parts = Vec::new();
        let mut start = 0;
        for &cut in cuts {
            let cut = cut.min(bytes.len());
            if cut > start {
                parts.push(Part::Bytes(bytes[start..cut].to_vec()));
                start = cut;
            }
        }
        if start < bytes.len() {
            parts.push(Part::Bytes(bytes[start..].to_vec()));
        }
        Self {
            status: 200,
            headers: HashMap::new(),
            parts,
            hang: false,
        }
    }

    pub fn then_fail(mut self, message: &str) -> Self {
        self.parts.push(Part::Fail(message.to_string()));
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
pub struct StubTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<WireRequest>>,
    calls: AtomicUsize,
    opened: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl StubTransport {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn opened_streams(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released_streams(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<WireRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> WireRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no request was sent")
    }

    fn next_reply(&self, request: WireRequest) -> Reply {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("stub transport ran out of scripted replies")
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, request: WireRequest) -> Result<RawResponse> {
        let reply = self.next_reply(request);
        let mut body = Vec::new();
        for part in reply.parts {
            match part {
                Part::Bytes(b) => body.extend_from_slice(&b),
                Part::Fail(msg) => return Err(Error::transport_msg(msg)),
            }
        }
        Ok(RawResponse {
            status: reply.status,
            headers: reply.headers,
            body: Bytes::from(body),
        })
    }

    async fn send_streaming(&self, request: WireRequest) -> Result<RawStreamResponse> {
        let reply = self.next_reply(request);
        self.opened.fetch_add(1, Ordering::SeqCst);

        let items: Vec<Result<Bytes>> = reply
            .parts
            .into_iter()
            .map(|p| match p {
                Part::Bytes(b) => Ok(Bytes::from(b)),
                Part::Fail(msg) => Err(Error::transport_msg(msg)),
            })
            .collect();
        let tail: BoxStream<'static, Bytes> = if reply.hang {
            Box::pin(stream::pending())
        } else {
            Box::pin(stream::empty())
        };
        let guard = ReleaseGuard(self.released.clone());
        let body = stream::iter(items).chain(tail).map(move |item| {
            let _held = &guard;
            item
        });

        Ok(RawStreamResponse {
            status: reply.status,
            headers: reply.headers,
            body: Box::pin(body),
        })
    }
}

/// Client over the stub with keys for every built-in provider.
pub fn client_with(transport: Arc<StubTransport>) -> UnifiedClient {
    UnifiedClient::builder()
        .transport(transport)
        .api_key("openai", "sk-openai")
        .api_key("anthropic", "sk-ant")
        .api_key("google", "AIza-google")
        .api_key("qwen", "sk-qwen")
        .api_key("deepseek", "sk-deepseek")
        .api_key("volcengine", "ark-key")
        .build()
        .expect("client builds with the built-in registry")
}
