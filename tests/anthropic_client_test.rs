//! Wire-level tests for the Anthropic messages client against a mock server.

use huginn::{
    AnthropicClient, HuginnError, MockProvider, ModelConfig, ProviderClient, ProviderKind, Usage,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload() -> Value {
    serde_json::to_value(MockProvider::analysis_for("claude says hi")).unwrap()
}

fn config(server: &MockServer) -> ModelConfig {
    ModelConfig::new(ProviderKind::Anthropic, "claude-haiku-4-5-20251001", "ak-test")
        .with_base_url(server.uri())
}

#[tokio::test]
async fn tool_use_block_is_the_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("x-api-key", "ak-test"))
        .and(body_partial_json(json!({
            "tool_choice": {"type": "tool", "name": "record_analysis"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "Here is the analysis."},
                {"type": "tool_use", "id": "toolu_1", "name": "record_analysis", "input": payload()}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 900, "output_tokens": 210}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let raw = AnthropicClient::new()
        .complete(&config(&server), "analyze this")
        .await
        .unwrap();

    assert_eq!(raw.payload, payload());
    assert_eq!(raw.usage, Some(Usage::new(900, 210)));
}

#[tokio::test]
async fn missing_tool_use_is_a_format_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "I would rather not."}]
        })))
        .mount(&server)
        .await;

    let err = AnthropicClient::new()
        .complete(&config(&server), "x")
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::Format(_)));
}

#[tokio::test]
async fn forbidden_maps_to_authentication_failed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let err = AnthropicClient::new()
        .complete(&config(&server), "x")
        .await
        .unwrap_err();
    assert!(matches!(&err, HuginnError::AuthenticationFailed { provider } if provider == "anthropic"));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn unavailable_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = AnthropicClient::new()
        .complete(&config(&server), "x")
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::Api { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn rate_limit_without_hint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = AnthropicClient::new()
        .complete(&config(&server), "x")
        .await
        .unwrap_err();
    assert!(matches!(err, HuginnError::RateLimited { retry_after: None }));
    assert_eq!(err.retry_after(), None);
}
