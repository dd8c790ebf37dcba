//! Integration tests for `WeatherClient` using wiremock HTTP mocks.

use std::time::Duration;

use surgecast_providers::{ProviderError, RetryPolicy, WeatherClient};
use wiremock::matchers::{method, path, query_param};
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

fn test_client(base_url: &str, max_retries: u32) -> WeatherClient {
    WeatherClient::with_base_url(
        Some("test-key".to_string()),
        30,
        "surgecast/test",
        fast_policy(max_retries),
        base_url,
    )
    .expect("client construction should not fail")
}

fn delhi_body() -> serde_json::Value {
    serde_json::json!({
        "main": { "temp": 31.4, "humidity": 58 },
        "rain": { "1h": 0.6 },
        "wind": { "speed": 4.1 },
        "weather": [ { "main": "Haze", "description": "haze" } ]
    })
}

#[tokio::test]
async fn current_returns_normalized_observation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .and(query_param("q", "Delhi"))
        .and(query_param("units", "metric"))
        .and(query_param("appid", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(delhi_body()))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let obs = client.current("Delhi").await.expect("should parse weather");

    assert!((obs.temperature_c - 31.4).abs() < f64::EPSILON);
    assert!((obs.humidity_pct - 58.0).abs() < f64::EPSILON);
    assert!((obs.precipitation_mm - 0.6).abs() < f64::EPSILON);
    assert_eq!(obs.wind_speed_ms, Some(4.1));
    assert_eq!(obs.condition.as_deref(), Some("Haze"));
    assert_eq!(obs.raw["main"]["humidity"], serde_json::json!(58));
}

#[tokio::test]
async fn missing_rain_block_defaults_to_zero_precipitation() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "main": { "temp": 22.0, "humidity": 40 }
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 0);
    let obs = client.current("Delhi").await.expect("should parse weather");
    assert!((obs.precipitation_mm - 0.0).abs() < f64::EPSILON);
    assert!(obs.wind_speed_ms.is_none());
    assert!(obs.condition.is_none());
}

#[tokio::test]
async fn unknown_location_maps_to_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "cod": "404", "message": "city not found"
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let err = client.current("Unknown City").await.unwrap_err();
    assert!(
        matches!(err, ProviderError::NotFound { ref location, .. } if location == "Unknown City"),
        "expected NotFound, got: {err:?}"
    );
    // Permanent failure: exactly one request despite max_retries = 3.
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn transient_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_json(delhi_body()))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let obs = client
        .current("Delhi")
        .await
        .expect("should succeed after retries");
    assert!((obs.temperature_c - 31.4).abs() < f64::EPSILON);
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        3,
        "2 failures + 1 success"
    );
}

#[tokio::test]
async fn exhausted_retries_surface_rate_limit_with_hint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 1);
    let err = client.current("Delhi").await.unwrap_err();
    assert!(
        matches!(
            err,
            ProviderError::RateLimited {
                retry_after_secs: Some(0),
                ..
            }
        ),
        "expected RateLimited with hint, got: {err:?}"
    );
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        2,
        "first attempt + 1 retry"
    );
}

#[tokio::test]
async fn malformed_body_is_a_permanent_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/weather"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri(), 3);
    let err = client.current("Delhi").await.unwrap_err();
    assert!(matches!(err, ProviderError::Deserialize { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
