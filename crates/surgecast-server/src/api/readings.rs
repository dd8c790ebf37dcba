use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use surgecast_core::SignalKind;
use surgecast_db::{AirQualityReadingRow, WeatherReadingRow};

use crate::middleware::RequestId;

use super::{
    map_db_error, map_engine_error, normalize_location_param, normalize_since_days, ApiError,
    ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct ReadingQuery {
    location: String,
    #[serde(default)]
    force: bool,
    since_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct WeatherReadingItem {
    pub signal: &'static str,
    pub location: String,
    pub captured_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: Option<f64>,
    pub condition: Option<String>,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub(super) struct AirQualityReadingItem {
    pub signal: &'static str,
    pub location: String,
    pub captured_at: DateTime<Utc>,
    pub aqi: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub source: String,
}

/// One reading of either signal type; serializes as the inner item.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub(super) enum ReadingItem {
    Weather(WeatherReadingItem),
    AirQuality(AirQualityReadingItem),
}

impl From<WeatherReadingRow> for ReadingItem {
    fn from(row: WeatherReadingRow) -> Self {
        ReadingItem::Weather(WeatherReadingItem {
            signal: "weather",
            location: row.location,
            captured_at: row.captured_at,
            temperature_c: row.temperature_c,
            humidity_pct: row.humidity_pct,
            precipitation_mm: row.precipitation_mm,
            wind_speed_ms: row.wind_speed_ms,
            condition: row.condition,
            source: row.source,
        })
    }
}

impl From<AirQualityReadingRow> for ReadingItem {
    fn from(row: AirQualityReadingRow) -> Self {
        ReadingItem::AirQuality(AirQualityReadingItem {
            signal: "air-quality",
            location: row.location,
            captured_at: row.captured_at,
            aqi: row.aqi,
            pm25: row.pm25,
            pm10: row.pm10,
            no2: row.no2,
            o3: row.o3,
            source: row.source,
        })
    }
}

fn parse_signal(request_id: &str, signal: &str) -> Result<SignalKind, ApiError> {
    signal
        .parse::<SignalKind>()
        .map_err(|e| ApiError::new(request_id.to_string(), "validation_error", e))
}

/// `GET /api/v1/readings/{signal}/latest?location=` — most recent stored
/// reading, no provider call ever.
pub(super) async fn latest_reading(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(signal): Path<String>,
    Query(query): Query<ReadingQuery>,
) -> Result<Json<ApiResponse<ReadingItem>>, ApiError> {
    let kind = parse_signal(&req_id.0, &signal)?;
    let location = normalize_location_param(&req_id.0, &query.location)?;

    let item: Option<ReadingItem> = match kind {
        SignalKind::Weather => {
            surgecast_db::latest_weather_reading(&state.pool, &location)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &surgecast_db::DbError::from(e)))?
                .map(ReadingItem::from)
        }
        SignalKind::AirQuality => {
            surgecast_db::latest_air_quality_reading(&state.pool, &location)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &surgecast_db::DbError::from(e)))?
                .map(ReadingItem::from)
        }
    };

    let item = item.ok_or_else(|| {
        ApiError::new(
            req_id.0.clone(),
            "not_found",
            format!("no {kind} reading stored for '{location}'"),
        )
    })?;

    Ok(Json(ApiResponse {
        data: item,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `POST /api/v1/readings/{signal}/refresh?location=&force=` — serve a fresh
/// cached reading or fetch through the freshness cache controller.
pub(super) async fn refresh_reading(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(signal): Path<String>,
    Query(query): Query<ReadingQuery>,
) -> Result<Json<ApiResponse<ReadingItem>>, ApiError> {
    let kind = parse_signal(&req_id.0, &signal)?;

    let item = match kind {
        SignalKind::Weather => state
            .engine
            .refresher()
            .get_or_refresh_weather(&query.location, query.force)
            .await
            .map(ReadingItem::from),
        SignalKind::AirQuality => state
            .engine
            .refresher()
            .get_or_refresh_air_quality(&query.location, query.force)
            .await
            .map(ReadingItem::from),
    }
    .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: item,
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/readings/{signal}/history?location=&since_days=` — stored
/// readings in the window, ascending by capture time.
pub(super) async fn reading_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(signal): Path<String>,
    Query(query): Query<ReadingQuery>,
) -> Result<Json<ApiResponse<Vec<ReadingItem>>>, ApiError> {
    let kind = parse_signal(&req_id.0, &signal)?;
    let location = normalize_location_param(&req_id.0, &query.location)?;
    let since = Utc::now() - Duration::days(normalize_since_days(query.since_days));

    let data: Vec<ReadingItem> = match kind {
        SignalKind::Weather => {
            surgecast_db::list_weather_readings_since(&state.pool, &location, since)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &surgecast_db::DbError::from(e)))?
                .into_iter()
                .map(ReadingItem::from)
                .collect()
        }
        SignalKind::AirQuality => {
            surgecast_db::list_air_quality_readings_since(&state.pool, &location, since)
                .await
                .map_err(|e| map_db_error(req_id.0.clone(), &surgecast_db::DbError::from(e)))?
                .into_iter()
                .map(ReadingItem::from)
                .collect()
        }
    };

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
