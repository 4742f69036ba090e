use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};
use reqwest::Method;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{RawResponse, RawStreamResponse, Transport, TransportConfig, WireRequest};
use crate::client::error_classification::map_reqwest_error;
use crate::{BoxStream, Error, ErrorContext, Result};

/// reqwest-backed transport.
///
/// Each call gets its own request; nothing is shared between calls except the
/// connection pool inside `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .http2_adaptive_window(true);

        if let Some(proxy) = &config.proxy {
            debug!(kind = ?proxy.kind, host = %proxy.host, port = proxy.port, "using proxy");
            builder = builder.proxy(proxy.to_reqwest()?);
        }

        let client = builder.build().map_err(|e| {
            Error::configuration_with_context(
                format!("failed to build HTTP client: {}", e),
                ErrorContext::new().with_source("http_transport"),
            )
        })?;

        Ok(Self {
            client,
            timeout: config.timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn build(&self, request: &WireRequest) -> Result<reqwest::RequestBuilder> {
        let method = Method::from_bytes(request.method.to_uppercase().as_bytes()).map_err(|_| {
            Error::configuration_with_context(
                format!("invalid HTTP method '{}'", request.method),
                ErrorContext::new().with_source("http_transport"),
            )
        })?;
        let mut req = self.client.request(method, &request.url).json(&request.body);
        for (k, v) in &request.headers {
            req = req.header(k, v);
        }
        if request.stream {
            req = req.header("accept", "text/event-stream");
        }
        Ok(req)
    }
}

fn collect_headers(resp: &reqwest::Response) -> HashMap<String, String> {
    resp.headers()
        .iter()
        .filter_map(|(k, v)| {
            v.to_str()
                .ok()
                .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// Each chunk read gets the full timeout; a stalled stream fails instead of hanging.
fn idle_guarded(resp: reqwest::Response, timeout: Duration) -> BoxStream<'static, Bytes> {
    let inner = resp.bytes_stream().boxed();
    let body = stream::unfold(Some(inner), move |state| async move {
        // `None` after a failure: the connection is already dropped.
        let mut inner = state?;
        match tokio::time::timeout(timeout, inner.next()).await {
            Ok(Some(Ok(bytes))) => Some((Ok(bytes), Some(inner))),
            Ok(Some(Err(e))) => Some((Err(map_reqwest_error(e, timeout)), None)),
            Ok(None) => None,
            Err(_) => Some((
                Err(Error::Timeout {
                    timeout: Some(timeout),
                    message: "no data received from provider within the timeout".into(),
                }),
                None,
            )),
        }
    });
    Box::pin(body)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: WireRequest) -> Result<RawResponse> {
        let req = self.build(&request)?.timeout(self.timeout);
        let resp = req
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;
        let status = resp.status().as_u16();
        let headers = collect_headers(&resp);
        let body = resp
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, self.timeout))?;
        debug!(status, bytes = body.len(), "response received");
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }

    async fn send_streaming(&self, request: WireRequest) -> Result<RawStreamResponse> {
        let req = self.build(&request)?;
        let resp = match tokio::time::timeout(self.timeout, req.send()).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => return Err(map_reqwest_error(e, self.timeout)),
            Err(_) => {
                return Err(Error::Timeout {
                    timeout: Some(self.timeout),
                    message: "provider did not send response headers within the timeout".into(),
                })
            }
        };
        let status = resp.status().as_u16();
        let headers = collect_headers(&resp);
        debug!(status, "stream opened");
        Ok(RawStreamResponse {
            status,
            headers,
            body: idle_guarded(resp, self.timeout),
        })
    }
}
