//! 传输层：所有厂商共享的、支持代理的 HTTP(S) 传输。
//!
//! Transport layer shared by every driver.
//!
//! The [`Transport`] trait is the seam between dispatch logic and the network:
//! [`HttpTransport`] is the production implementation; tests plug in stubs.
//! A transport never interprets response bodies and never retries.

pub mod config;
pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::{BoxStream, Result};

pub use config::{ProxyConfig, ProxyKind, TransportConfig};
pub use http::HttpTransport;

/// Header names whose values are never printed.
const SECRET_HEADERS: &[&str] = &["authorization", "x-api-key", "x-goog-api-key"];

/// Provider-specific HTTP request produced by a driver.
#[derive(Clone, PartialEq)]
pub struct WireRequest {
    pub url: String,
    /// HTTP method (POST for generation).
    pub method: String,
    pub headers: HashMap<String, String>,
    /// JSON request body.
    pub body: Value,
    /// Whether the provider was asked for an event stream.
    pub stream: bool,
}

impl fmt::Debug for WireRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let headers: HashMap<&str, &str> = self
            .headers
            .iter()
            .map(|(k, v)| {
                let shown = if SECRET_HEADERS.contains(&k.to_ascii_lowercase().as_str()) {
                    "<redacted>"
                } else {
                    v.as_str()
                };
                (k.as_str(), shown)
            })
            .collect();
        f.debug_struct("WireRequest")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &headers)
            .field("body", &self.body)
            .field("stream", &self.stream)
            .finish()
    }
}

/// A fully read response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    /// Lower-cased header names.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A response whose body is still arriving.
///
/// The body is lazy, finite and non-restartable. Dropping it releases the
/// underlying connection.
pub struct RawStreamResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: BoxStream<'static, Bytes>,
}

impl RawStreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body into a [`RawResponse`]; used to read error payloads.
    pub async fn collect(mut self) -> Result<RawResponse> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(RawResponse {
            status: self.status,
            headers: self.headers,
            body: Bytes::from(buf),
        })
    }
}

impl fmt::Debug for RawStreamResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawStreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Network seam used by the client.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Send a request and read the whole response body.
    async fn send(&self, request: WireRequest) -> Result<RawResponse>;

    /// Send a request and return as soon as response headers arrive.
    async fn send_streaming(&self, request: WireRequest) -> Result<RawStreamResponse>;
}
