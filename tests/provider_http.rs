//! Real HTTP round trips against a mock server, one per protocol family.

mod integration;

use futures::StreamExt;
use integration::mock_server::MockServerFixture;
use mockito::Matcher;
use serde_json::json;
use unified_llm::{
    ErrorClass, ErrorKind, Message, RequestConfig, StreamEvent, TransportConfig, UnifiedClient,
};

fn conversation() -> Vec<Message> {
    vec![
        Message::system("Be brief."),
        Message::user("Say hi"),
    ]
}

#[tokio::test]
async fn openai_compatible_round_trip() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "Say hi"}
            ],
            "temperature": 0.3
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"Hi!"},"finish_reason":"stop"}],"usage":{"prompt_tokens":12,"completion_tokens":2}}"#,
        )
        .create_async()
        .await;

    let client = fixture.client_for("openai", "sk-test");
    let resp = client
        .generate(&conversation(), &RequestConfig::new("gpt-4o").temperature(0.3))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(resp.content, "Hi!");
    assert_eq!(resp.provider, "openai");
    assert_eq!(resp.model, "gpt-4o");
    let usage = resp.usage.unwrap();
    assert_eq!(usage.total_tokens, Some(14));
    assert!(!resp.request_id.is_empty());
}

#[tokio::test]
async fn anthropic_stream_over_http() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_sse(
            "/v1/messages",
            &[
                "event: message_start\ndata: {\"type\":\"message_start\",\"message\":{\"usage\":{\"input_tokens\":5,\"output_tokens\":1}}}",
                "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}",
                "event: content_block_delta\ndata: {\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\" there\"}}",
                "event: message_delta\ndata: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"},\"usage\":{\"output_tokens\":3}}",
                "event: message_stop\ndata: {\"type\":\"message_stop\"}",
            ],
        )
        .await;

    let client = fixture.client_for("anthropic", "ak-test");
    let stream = client
        .generate_stream(&conversation(), &RequestConfig::new("claude-3-5-sonnet-20241022"))
        .await
        .unwrap();
    assert_eq!(stream.provider(), "anthropic");
    let events: Vec<StreamEvent> = stream.collect().await;

    mock.assert_async().await;
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::ContentDelta(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "Hi there");
    match &events[events.len() - 2] {
        StreamEvent::UsageFinal(u) => {
            assert_eq!(u.prompt_tokens, Some(5));
            assert_eq!(u.completion_tokens, Some(3));
            assert_eq!(u.total_tokens, Some(8));
        }
        other => panic!("expected usage, got {other:?}"),
    }
    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn gemini_round_trip_uses_model_path_and_key_header() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json_with_header(
            "/models/gemini-2.0-flash:generateContent",
            "x-goog-api-key",
            "AIza-test",
            r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hello"},{"text":" world"}]},"finishReason":"STOP"}],"usageMetadata":{"promptTokenCount":4,"candidatesTokenCount":2,"totalTokenCount":6}}"#,
        )
        .await;

    let client = fixture.client_for("google", "AIza-test");
    let resp = client
        .generate(&conversation(), &RequestConfig::new("gemini-2.0-flash"))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(resp.content, "Hello world");
    assert_eq!(resp.usage.unwrap().total_tokens, Some(6));
}

#[tokio::test]
async fn dashscope_stream_over_http() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("POST", "/services/aigc/text-generation/generation")
        .match_header("x-dashscope-sse", "enable")
        .match_header("authorization", "Bearer sk-qwen")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(concat!(
            "id:1\nevent:result\n:HTTP_STATUS/200\ndata:{\"output\":{\"choices\":[{\"message\":{\"role\":\"assistant\",\"content\":\"你好\"},\"finish_reason\":\"null\"}]},\"usage\":{\"input_tokens\":6,\"output_tokens\":1}}\n\n",
            "id:2\nevent:result\n:HTTP_STATUS/200\ndata:{\"output\":{\"choices\":[{\"message\":{\"role\":\"assistant\",\"content\":\"！\"},\"finish_reason\":\"stop\"}]},\"usage\":{\"input_tokens\":6,\"output_tokens\":2,\"total_tokens\":8}}\n\n",
        ))
        .create_async()
        .await;

    let client = fixture.client_for("qwen", "sk-qwen");
    let resp = client
        .generate_stream(&conversation(), &RequestConfig::new("qwen-plus"))
        .await
        .unwrap()
        .collect_response()
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(resp.content, "你好！");
    assert_eq!(resp.usage.unwrap().total_tokens, Some(8));
}

#[tokio::test]
async fn rate_limit_keeps_status_code_and_retry_hint() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .server
        .mock("POST", "/chat/completions")
        .with_status(429)
        .with_header("content-type", "application/json")
        .with_header("retry-after", "2")
        .with_body(
            r#"{"error":{"message":"Rate limit reached for gpt-4o","type":"requests","code":"rate_limit_exceeded"}}"#,
        )
        .create_async()
        .await;

    let client = fixture.client_for("openai", "sk-test");
    let err = client
        .generate(&conversation(), &RequestConfig::new("gpt-4o"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProviderReported);
    match err {
        unified_llm::Error::ProviderReported {
            provider,
            status,
            code,
            class,
            message,
            retry_after_ms,
        } => {
            assert_eq!(provider, "openai");
            assert_eq!(status, Some(429));
            assert_eq!(code.as_deref(), Some("rate_limit_exceeded"));
            assert_eq!(class, ErrorClass::RateLimited);
            assert!(class.retryable());
            assert_eq!(message, "Rate limit reached for gpt-4o");
            assert_eq!(retry_after_ms, Some(2000));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_is_an_authentication_class() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json(
            "/v1/messages",
            401,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        )
        .await;

    let client = fixture.client_for("anthropic", "wrong");
    let err = client
        .generate(&conversation(), &RequestConfig::new("claude-3-5-sonnet-20241022"))
        .await
        .unwrap_err();
    match err {
        unified_llm::Error::ProviderReported { class, status, .. } => {
            assert_eq!(class, ErrorClass::Authentication);
            assert_eq!(status, Some(401));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn non_json_success_body_is_a_protocol_error() {
    let mut fixture = MockServerFixture::new().await;
    let _mock = fixture
        .mock_json("/chat/completions", 200, "<html>gateway</html>")
        .await;

    let client = fixture.client_for("deepseek", "sk-ds");
    let err = client
        .generate(&conversation(), &RequestConfig::new("deepseek-chat"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProviderProtocol);
}

#[tokio::test]
async fn refused_connection_is_a_transport_error() {
    let client = UnifiedClient::builder()
        .transport_config(TransportConfig::default())
        .api_key("openai", "sk-test")
        .base_url_override("openai", "http://127.0.0.1:1")
        .build()
        .unwrap();

    let err = client
        .generate(&conversation(), &RequestConfig::new("gpt-4o"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);

    let err = client
        .generate_stream(&conversation(), &RequestConfig::new("gpt-4o"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
}
