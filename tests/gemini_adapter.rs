//! Gemini adapter against a wiremock vendor
//!
//! Exercises key rotation, failure classification and the in-adapter retry
//! rules without going through the router.

use quotaroute::error::ErrorClass;
use quotaroute::models::quota_clock::now_ms;
use quotaroute::providers::gemini::GeminiWire;
use quotaroute::providers::{
    CompletionRequest, HttpAdapter, KeyPool, Message, ProviderAdapter, RetryPolicy,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "gemini-2.5-flash";
const ENDPOINT: &str = "/models/gemini-2.5-flash:generateContent";

fn adapter(server: &MockServer, keys: &[&str]) -> HttpAdapter<GeminiWire> {
    adapter_with_retries(server, keys, 2)
}

fn adapter_with_retries(
    server: &MockServer,
    keys: &[&str],
    max_overload_retries: usize,
) -> HttpAdapter<GeminiWire> {
    let pool = KeyPool::new(
        "gemini",
        keys.iter().map(|k| k.to_string()).collect(),
    );
    HttpAdapter::new(
        "gemini",
        server.uri(),
        pool,
        GeminiWire,
        Duration::from_secs(5),
    )
    .with_retry(RetryPolicy {
        overload_backoff_ms: 10,
        max_overload_retries,
    })
}

fn text_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}],
        "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 1}
    })
}

fn request() -> CompletionRequest {
    CompletionRequest::new("chat", vec![Message::user("ping")])
}

#[tokio::test]
async fn test_rate_limited_key_rotates_to_next_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "key-aaaaaaaa"))
        .respond_with(ResponseTemplate::new(429).set_body_json(
            json!({"error": {"code": 429, "message": "Too many requests per minute"}}),
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "key-bbbbbbbb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("pong")))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, &["key-aaaaaaaa", "key-bbbbbbbb"]);
    let response = adapter.complete(MODEL, &request()).await.unwrap();

    assert_eq!(response.text, "pong");
    assert_eq!(response.usage.input_tokens, 4);
    let cooldowns = adapter.keys().cooldowns().await;
    assert!(cooldowns[0] > now_ms());
    assert_eq!(cooldowns[1], 0);
    assert!(adapter.is_available().await);
}

#[tokio::test]
async fn test_daily_quota_cools_only_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"code": 429, "status": "RESOURCE_EXHAUSTED",
                      "message": "Quota exceeded for metric generate_requests_per_day"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, &["only-key-12345678"]);
    let err = adapter.complete(MODEL, &request()).await.unwrap_err();

    assert_eq!(err.class, ErrorClass::Quota);
    assert_eq!(err.status, Some(429));
    let cooldowns = adapter.keys().cooldowns().await;
    assert!(cooldowns[0] > now_ms());
    assert!(!adapter.is_available().await);
}

#[tokio::test]
async fn test_empty_response_is_a_generic_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, &["k-11111111"]);
    let err = adapter.complete(MODEL, &request()).await.unwrap_err();
    assert_eq!(err.class, ErrorClass::Generic);
    assert!(err.message.contains("empty"));
}

#[tokio::test]
async fn test_auth_failure_returns_fatal_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(401).set_body_json(
            json!({"error": {"code": 401, "status": "UNAUTHENTICATED", "message": "API key not valid"}}),
        ))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, &["k-11111111", "k-22222222"]);
    let err = adapter.complete(MODEL, &request()).await.unwrap_err();
    assert_eq!(err.class, ErrorClass::Fatal);
    assert!(err.message.contains("UNAUTHENTICATED"));
}

#[tokio::test]
async fn test_overload_backs_off_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_reply("recovered")))
        .mount(&server)
        .await;

    let adapter = adapter(&server, &["k-11111111"]);
    let response = adapter.complete(MODEL, &request()).await.unwrap();
    assert_eq!(response.text, "recovered");
}

async fn always_overloaded(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(503).set_body_json(
            json!({"error": {"code": 503, "status": "UNAVAILABLE", "message": "The model is overloaded"}}),
        ))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_overload_calls_capped_at_key_count_plus_two() {
    let server = MockServer::start().await;
    always_overloaded(&server, 3).await;

    let adapter = adapter_with_retries(&server, &["k-11111111"], 10);
    let err = adapter.complete(MODEL, &request()).await.unwrap_err();

    assert_eq!(err.class, ErrorClass::Overload);
    assert_eq!(err.status, Some(503));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_overload_calls_never_exceed_five() {
    let server = MockServer::start().await;
    always_overloaded(&server, 5).await;

    let keys = ["k-11111111", "k-22222222", "k-33333333", "k-44444444"];
    let adapter = adapter_with_retries(&server, &keys, 10);
    let err = adapter.complete(MODEL, &request()).await.unwrap_err();

    assert_eq!(err.class, ErrorClass::Overload);
    assert_eq!(server.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_missing_usage_is_estimated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{"content": {"parts": [{"text": "12345678"}]}}]
        })))
        .mount(&server)
        .await;

    let adapter = adapter(&server, &["k-11111111"]);
    let response = adapter.complete(MODEL, &request()).await.unwrap();
    // "ping" -> 1 token, "12345678" -> 2 tokens
    assert_eq!(response.usage.input_tokens, 1);
    assert_eq!(response.usage.output_tokens, 2);
}

#[tokio::test]
async fn test_slow_vendor_times_out_as_generic() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_reply("late"))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let pool = KeyPool::new("gemini", vec!["k-11111111".to_string()]);
    let adapter = HttpAdapter::new(
        "gemini",
        server.uri(),
        pool,
        GeminiWire,
        Duration::from_millis(50),
    );
    let err = adapter.complete(MODEL, &request()).await.unwrap_err();
    assert_eq!(err.class, ErrorClass::Generic);
}
