//! Mock HTTP server setup for integration tests

use mockito::{Matcher, Mock, Server, ServerGuard};
use unified_llm::{TransportConfig, UnifiedClient};

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: ServerGuard,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self { server, base_url }
    }

    /// Client whose `provider` base URL points at the mock server.
    pub fn client_for(&self, provider: &str, key: &str) -> UnifiedClient {
        UnifiedClient::builder()
            .transport_config(TransportConfig::default())
            .api_key(provider, key)
            .base_url_override(provider, &self.base_url)
            .build()
            .expect("client builds")
    }

    /// Create a mock for a successful JSON response
    pub async fn mock_json(&mut self, path: &str, status: u16, body: &str) -> Mock {
        self.server
            .mock("POST", path)
            .with_status(status as usize)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock for a successful streaming response (SSE); `frames` are
    /// complete frames without the trailing blank line.
    pub async fn mock_sse(&mut self, path: &str, frames: &[&str]) -> Mock {
        let body: String = frames.iter().map(|f| format!("{}\n\n", f)).collect();
        self.server
            .mock("POST", path)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await
    }

    /// Like [`mock_json`](Self::mock_json) but also requires a header value.
    pub async fn mock_json_with_header(
        &mut self,
        path: &str,
        header: &str,
        value: &str,
        body: &str,
    ) -> Mock {
        self.server
            .mock("POST", path)
            .match_header(header, value)
            .match_body(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }
}
