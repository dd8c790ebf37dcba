mod predictions;
mod readings;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use surgecast_engine::{Engine, EngineError};
use surgecast_providers::ProviderError;

use crate::middleware::{enforce_rate_limit, request_id, RateLimitState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub engine: Arc<Engine>,
    /// Predictions older than this are regenerated on `latest` reads.
    pub freshness_threshold_hours: i64,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "missing_mandatory_signal" | "provider_error" => StatusCode::BAD_GATEWAY,
            "missing_credentials" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Clamp a `since_days` query parameter to a sane window.
pub(super) fn normalize_since_days(since_days: Option<i64>) -> i64 {
    since_days.unwrap_or(7).clamp(1, 90)
}

/// Normalize a caller-supplied location so read paths query the same key the
/// write paths store (`Engine::predict` and the cache controller persist the
/// trimmed form).
pub(super) fn normalize_location_param(
    request_id: &str,
    location: &str,
) -> Result<String, ApiError> {
    surgecast_core::normalize_location(location).ok_or_else(|| {
        ApiError::new(
            request_id.to_string(),
            "validation_error",
            format!("invalid location: '{location}'"),
        )
    })
}

/// Map an engine failure to the API error taxonomy.
///
/// Partial degradation never reaches this point — only true inability to
/// produce a result does.
pub(super) fn map_engine_error(request_id: String, error: &EngineError) -> ApiError {
    match error {
        EngineError::InvalidLocation(location) => ApiError::new(
            request_id,
            "validation_error",
            format!("invalid location: '{location}'"),
        ),
        EngineError::MissingMandatorySignal { location, .. } => ApiError::new(
            request_id,
            "missing_mandatory_signal",
            format!("no weather data obtainable for '{location}'"),
        ),
        EngineError::Provider(ProviderError::MissingCredentials(provider)) => ApiError::new(
            request_id,
            "missing_credentials",
            format!("no API key configured for {provider}"),
        ),
        EngineError::Provider(ProviderError::NotFound { location, .. }) => ApiError::new(
            request_id,
            "not_found",
            format!("provider has no data for '{location}'"),
        ),
        EngineError::Provider(e) => {
            tracing::error!(error = %e, "provider call failed");
            ApiError::new(request_id, "provider_error", "external provider failed")
        }
        EngineError::Db(e) | EngineError::Synthesis(e) => {
            tracing::error!(error = %e, "database operation failed");
            ApiError::new(request_id, "internal_error", "database operation failed")
        }
        EngineError::Serialize(e) => {
            tracing::error!(error = %e, "payload serialization failed");
            ApiError::new(request_id, "internal_error", "internal serialization failure")
        }
    }
}

pub(super) fn map_db_error(request_id: String, error: &surgecast_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

fn api_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/readings/{signal}/latest",
            get(readings::latest_reading),
        )
        .route(
            "/api/v1/readings/{signal}/history",
            get(readings::reading_history),
        )
        .route(
            "/api/v1/readings/{signal}/refresh",
            post(readings::refresh_reading),
        )
        .route(
            "/api/v1/predictions/{location}/generate",
            post(predictions::generate_prediction),
        )
        .route(
            "/api/v1/predictions/{location}/latest",
            get(predictions::latest_prediction),
        )
        .route(
            "/api/v1/predictions/{location}/history",
            get(predictions::prediction_history),
        )
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(api_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match surgecast_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration as StdDuration;
    use surgecast_advisory::AdvisoryClient;
    use surgecast_core::{LocationConfig, LocationsFile};
    use surgecast_engine::{EngineConfig, Refresher, ReconcilerConfig};
    use surgecast_providers::{AirQualityClient, RetryPolicy, WeatherClient};
    use tower::ServiceExt;

    /// Build an `AppState` whose provider clients point at an unroutable
    /// address — read paths must never touch the network.
    fn test_state(pool: sqlx::PgPool) -> AppState {
        let policy = RetryPolicy {
            max_retries: 0,
            initial_delay: StdDuration::ZERO,
            max_delay: StdDuration::ZERO,
            backoff_multiplier: 2,
            jitter: StdDuration::ZERO,
        };
        let dead = "http://127.0.0.1:1";
        let weather = WeatherClient::with_base_url(
            Some("k".to_string()),
            1,
            "surgecast/test",
            policy,
            dead,
        )
        .expect("weather client");
        let air_quality = AirQualityClient::with_base_url(
            Some("k".to_string()),
            1,
            "surgecast/test",
            policy,
            dead,
        )
        .expect("air quality client");
        let advisory = AdvisoryClient::with_base_url(
            Some("k".to_string()),
            "gpt-4o-mini",
            1,
            "surgecast/test",
            policy,
            dead,
        )
        .expect("advisory client");

        let locations = LocationsFile {
            locations: vec![LocationConfig {
                name: "Delhi".to_string(),
                admission_baseline: None,
            }],
            events: vec![],
        };
        let engine_config = EngineConfig {
            default_admission_baseline: 100.0,
            reconciler: ReconcilerConfig {
                risk_threshold: 40,
                dedup_window_hours: 24,
                active_window_days: 7,
                purge_horizon_days: 7,
            },
        };
        let refresher = Refresher::new(pool.clone(), weather, air_quality, 6);
        let engine = Arc::new(Engine::new(
            pool.clone(),
            refresher,
            advisory,
            locations,
            engine_config,
        ));

        AppState {
            pool,
            engine,
            freshness_threshold_hours: 6,
        }
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn health_returns_ok(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"].as_str(), Some("ok"));
        assert!(json["meta"]["request_id"].is_string());
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn latest_reading_returns_404_when_store_is_empty(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/readings/weather/latest?location=Delhi")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn latest_reading_returns_seeded_row(pool: sqlx::PgPool) {
        sqlx::query(
            "INSERT INTO weather_readings \
                 (location, temperature_c, humidity_pct, precipitation_mm, source) \
             VALUES ('Delhi', 29.5, 48, 0, 'openweather')",
        )
        .execute(&pool)
        .await
        .expect("seed reading");

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/readings/weather/latest?location=Delhi")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["signal"].as_str(), Some("weather"));
        assert_eq!(json["data"]["location"].as_str(), Some("Delhi"));
        assert!((json["data"]["temperature_c"].as_f64().unwrap() - 29.5).abs() < 0.001);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn unknown_signal_is_a_validation_error(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/readings/pollen/latest?location=Delhi")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn reading_history_is_ascending(pool: sqlx::PgPool) {
        sqlx::query(
            "INSERT INTO air_quality_readings (location, captured_at, aqi, source) \
             VALUES \
                 ('Delhi', NOW() - INTERVAL '2 days', 140, 'waqi'), \
                 ('Delhi', NOW() - INTERVAL '1 day', 95, 'waqi')",
        )
        .execute(&pool)
        .await
        .expect("seed readings");

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/readings/air-quality/history?location=Delhi&since_days=7")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 2);
        assert!(
            (data[0]["aqi"].as_f64().unwrap() - 140.0).abs() < 0.001,
            "oldest reading first"
        );
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn prediction_history_empty_is_ok(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/predictions/Delhi/history")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"].as_array().map(Vec::len), Some(0));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn prediction_reads_normalize_the_location_key(pool: sqlx::PgPool) {
        // Predictions are stored under the trimmed location; a padded path
        // param must still find them instead of regenerating.
        sqlx::query(
            "INSERT INTO predictions \
                 (public_id, location, generated_at, risk_score, estimated_affected, \
                  engine_version, features) \
             VALUES (gen_random_uuid(), 'Delhi', NOW() - INTERVAL '2 days', 60, 150, \
                     'surgecast-engine/0.1.0', '{}'::jsonb)",
        )
        .execute(&pool)
        .await
        .expect("seed prediction");

        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/predictions/%20Delhi%20/history")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = json["data"].as_array().expect("data array");
        assert_eq!(data.len(), 1, "padded location must hit the stored key");
        assert_eq!(data[0]["location"].as_str(), Some("Delhi"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn prediction_reads_reject_invalid_locations(pool: sqlx::PgPool) {
        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/predictions/1234/history")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn latest_prediction_serves_fresh_row_without_regenerating(pool: sqlx::PgPool) {
        sqlx::query(
            "INSERT INTO predictions \
                 (public_id, location, generated_at, risk_score, estimated_affected, \
                  engine_version, features) \
             VALUES (gen_random_uuid(), 'Delhi', NOW() - INTERVAL '1 hour', 45, 120, \
                     'surgecast-engine/0.1.0', '{}'::jsonb)",
        )
        .execute(&pool)
        .await
        .expect("seed prediction");

        // Providers are unroutable, so this only passes if the stored
        // prediction is served without a synthesis run.
        let app = build_app(test_state(pool), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/predictions/Delhi/latest")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["risk_score"].as_i64(), Some(45));
    }

    #[test]
    fn normalize_since_days_applies_defaults_and_bounds() {
        assert_eq!(normalize_since_days(None), 7);
        assert_eq!(normalize_since_days(Some(0)), 1);
        assert_eq!(normalize_since_days(Some(1_000)), 90);
        assert_eq!(normalize_since_days(Some(30)), 30);
    }

    #[test]
    fn api_error_validation_error_maps_to_bad_request() {
        let response = ApiError::new("req-1", "validation_error", "invalid input").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_error_missing_signal_maps_to_bad_gateway() {
        let response =
            ApiError::new("req-2", "missing_mandatory_signal", "no weather").into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn api_error_missing_credentials_maps_to_service_unavailable() {
        let response = ApiError::new("req-3", "missing_credentials", "no key").into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn map_engine_error_tags_invalid_location() {
        let err = EngineError::InvalidLocation("x".to_string());
        let api_err = map_engine_error("req-4".to_string(), &err);
        assert_eq!(api_err.error.code, "validation_error");
    }

    #[test]
    fn map_engine_error_tags_missing_credentials() {
        let err = EngineError::Provider(ProviderError::MissingCredentials("openweather"));
        let api_err = map_engine_error("req-5".to_string(), &err);
        assert_eq!(api_err.error.code, "missing_credentials");
    }
}
