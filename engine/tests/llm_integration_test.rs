//! Integration tests for the LLM providers
//!
//! Both providers are exercised against wiremock servers; no real model
//! service is needed.

use serde_json::json;
use std::time::Duration;
use wiremock::{
    matchers::{body_partial_json, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

use barista_engine::config::OpenAIConfig;
use barista_engine::llm::{
    ollama::OllamaProvider, openai::OpenAIProvider, LLMError, LLMProvider, Message,
};

fn openai(base_url: &str, api_key: Option<&str>) -> OpenAIProvider {
    let config = OpenAIConfig {
        base_url: base_url.to_string(),
        ..Default::default()
    };
    OpenAIProvider::new(
        config,
        api_key.map(str::to_string),
        0.0,
        Duration::from_secs(2),
    )
    .unwrap()
}

fn ollama(base_url: &str) -> OllamaProvider {
    OllamaProvider::new(base_url, "llama3.1:8b", 0.0, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_openai_returns_first_choice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({"model": "gpt-4o-mini", "temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {"role": "assistant", "content": "INTENT: greet"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = openai(&server.uri(), Some("sk-test"));
    let reply = provider
        .generate(&[Message::system("rules"), Message::user("hi")])
        .await
        .unwrap();

    assert_eq!(reply, "INTENT: greet");
}

#[tokio::test]
async fn test_openai_status_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let provider = openai(&server.uri(), Some("sk-test"));
    let messages = [Message::user("hi")];

    assert!(matches!(
        provider.generate(&messages).await,
        Err(LLMError::RateLimitExceeded)
    ));
    assert!(matches!(
        provider.generate(&messages).await,
        Err(LLMError::AuthenticationFailed(_))
    ));
}

#[tokio::test]
async fn test_openai_without_key_never_calls_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = openai(&server.uri(), None);
    let result = provider.generate(&[Message::user("hi")]).await;

    match result {
        Err(LLMError::AuthenticationFailed(msg)) => assert!(msg.contains("OPENAI_API_KEY")),
        other => panic!("Expected AuthenticationFailed, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_openai_missing_content_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let provider = openai(&server.uri(), Some("sk-test"));
    assert!(matches!(
        provider.generate(&[Message::user("hi")]).await,
        Err(LLMError::ParseError(_))
    ));
}

#[tokio::test]
async fn test_ollama_chat_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({"model": "llama3.1:8b", "stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "llama3.1:8b",
            "message": {"role": "assistant", "content": "Hello there"},
            "done": true
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
        .mount(&server)
        .await;

    let provider = ollama(&server.uri());
    assert_eq!(provider.name(), "ollama");
    assert!(provider.check_health().await);
    assert_eq!(
        provider.generate(&[Message::user("hi")]).await.unwrap(),
        "Hello there"
    );
}

#[tokio::test]
async fn test_ollama_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let provider = ollama(&server.uri());
    assert!(matches!(
        provider.generate(&[Message::user("hi")]).await,
        Err(LLMError::Timeout)
    ));
}

#[tokio::test]
async fn test_ollama_connection_error() {
    // Nothing listens on port 1
    let provider = ollama("http://127.0.0.1:1");

    assert!(!provider.check_health().await);
    match provider.generate(&[Message::user("Hello")]).await {
        Err(LLMError::ProviderUnavailable(msg)) => {
            assert!(msg.contains("Cannot connect to Ollama"));
        }
        Err(LLMError::NetworkError(_)) => {
            // Also acceptable - network errors can manifest differently
        }
        other => panic!(
            "Expected ProviderUnavailable or NetworkError, got: {:?}",
            other
        ),
    }
}
