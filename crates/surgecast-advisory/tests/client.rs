//! Integration tests for `AdvisoryClient` using wiremock HTTP mocks.

use std::time::Duration;

use surgecast_advisory::{Advisory, AdvisoryClient, AdvisoryError};
use surgecast_core::Confidence;
use surgecast_providers::RetryPolicy;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
        backoff_multiplier: 2,
        jitter: Duration::ZERO,
    }
}

fn test_client(base_url: &str, max_retries: u32) -> AdvisoryClient {
    AdvisoryClient::with_base_url(
        Some("test-key".to_string()),
        "gpt-4o-mini",
        30,
        "surgecast/test",
        fast_policy(max_retries),
        base_url,
    )
    .expect("client construction should not fail")
}

fn completion_with(content: &str) -> serde_json::Value {
    serde_json::json!({
        "id": "chatcmpl-1",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": content } }
        ]
    })
}

fn context() -> serde_json::Value {
    serde_json::json!({
        "location": "Delhi",
        "risk_score": 45,
        "aqi": 180.0,
        "temperature_c": 22.0
    })
}

#[tokio::test]
async fn structured_reply_parses_into_payload() {
    let server = MockServer::start().await;

    let advisory_json = serde_json::json!({
        "summary": "Respiratory surge likely",
        "staffing_plan": "Add triage staff",
        "supply_plan": "Stock inhalers",
        "suggested_actions": ["Brief ED leads"],
        "suggested_medicines": ["Salbutamol"],
        "suggested_diseases": [{ "name": "Asthma exacerbation", "severity": "high" }],
        "weather_impact": "Mild",
        "air_quality_impact": "Severe",
        "confidence": "medium"
    })
    .to_string();

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({ "model": "gpt-4o-mini" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(&advisory_json)))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let advisory = client.synthesize(&context()).await.expect("synthesize");

    let Advisory::Structured(payload) = advisory else {
        panic!("expected structured advisory");
    };
    assert_eq!(payload.summary, "Respiratory surge likely");
    assert_eq!(payload.confidence, Confidence::Medium);
    assert_eq!(payload.suggested_diseases[0].name, "Asthma exacerbation");
}

#[tokio::test]
async fn free_text_reply_degrades_instead_of_erroring() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_with(
            "I could not produce JSON, but expect a difficult week.",
        )))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let advisory = client.synthesize(&context()).await.expect("synthesize");

    let Advisory::Degraded { ref raw } = advisory else {
        panic!("expected degraded advisory");
    };
    assert!(raw.contains("difficult week"));
    assert_eq!(advisory.confidence(), Confidence::Low);
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(completion_with("{\"summary\": \"recovered\"}")),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let advisory = client.synthesize(&context()).await.expect("synthesize");
    assert_eq!(advisory.summary(), "recovered");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn empty_choices_is_a_typed_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "chatcmpl-2",
            "choices": []
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let err = client.synthesize(&context()).await.unwrap_err();
    assert!(matches!(err, AdvisoryError::EmptyResponse));
}

#[tokio::test]
async fn missing_api_key_fails_before_any_call() {
    let client = AdvisoryClient::with_base_url(
        None,
        "gpt-4o-mini",
        30,
        "surgecast/test",
        fast_policy(0),
        "http://127.0.0.1:1",
    )
    .expect("client construction should not fail");
    let err = client.synthesize(&context()).await.unwrap_err();
    assert!(matches!(err, AdvisoryError::MissingCredentials));
}
