//! SSE 帧解码：字节流 -> `SseFrame`
//!
//! Server-Sent Events framing. Bytes are buffered until a full line is available,
//! so multi-byte UTF-8 sequences split across network chunks decode correctly.
//! Both `\n` and `\r\n` line endings are accepted; a blank line ends a frame.

use bytes::Bytes;
use futures::{stream, StreamExt};
use std::collections::VecDeque;

use crate::BoxStream;

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// The `event:` field, when the provider names its events (Anthropic does).
    pub event: Option<String>,
    /// All `data:` lines of the frame joined with `\n`.
    pub data: String,
}

#[derive(Debug, Default)]
struct FrameBuilder {
    event: Option<String>,
    data: Vec<String>,
}

impl FrameBuilder {
    fn line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.find(':') {
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };
        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            // id / retry carry nothing the normalizer needs
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

struct DecodeState {
    input: Option<BoxStream<'static, Bytes>>,
    buf: Vec<u8>,
    builder: FrameBuilder,
    ready: VecDeque<SseFrame>,
}

impl DecodeState {
    fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buf.drain(..=pos).collect();
            let mut line = &raw[..raw.len() - 1];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            self.push_line(line);
        }
    }

    fn push_line(&mut self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        if let Some(frame) = self.builder.line(&line) {
            self.ready.push_back(frame);
        }
    }

    /// EOF: a trailing line or frame without its terminator is still delivered.
    fn finish(&mut self) {
        if !self.buf.is_empty() {
            let rest = std::mem::take(&mut self.buf);
            let rest = rest.strip_suffix(b"\r").unwrap_or(&rest);
            self.push_line(rest);
        }
        if let Some(frame) = self.builder.dispatch() {
            self.ready.push_back(frame);
        }
    }
}

/// Decode a raw byte stream into SSE frames.
///
/// An error from the byte stream is forwarded once and ends the output; the
/// underlying stream is dropped at that point.
pub fn decode_sse(input: BoxStream<'static, Bytes>) -> BoxStream<'static, SseFrame> {
    let state = DecodeState {
        input: Some(input),
        buf: Vec::new(),
        builder: FrameBuilder::default(),
        ready: VecDeque::new(),
    };

    let frames = stream::unfold(state, |mut st| async move {
        loop {
            if let Some(frame) = st.ready.pop_front() {
                return Some((Ok(frame), st));
            }
            let input = st.input.as_mut()?;
            let next = input.next().await;
            match next {
                Some(Ok(bytes)) => st.feed(&bytes),
                Some(Err(e)) => {
                    st.input = None;
                    st.buf.clear();
                    return Some((Err(e), st));
                }
                None => {
                    st.input = None;
                    st.finish();
                }
            }
        }
    });
    Box::pin(frames)
}
