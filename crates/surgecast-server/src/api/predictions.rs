use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use surgecast_db::PredictionRow;

use crate::middleware::RequestId;

use super::{
    map_db_error, map_engine_error, normalize_location_param, normalize_since_days, ApiError,
    ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Deserialize)]
pub(super) struct PredictionQuery {
    since_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct PredictionItem {
    pub id: Uuid,
    pub location: String,
    pub generated_at: DateTime<Utc>,
    pub risk_score: i16,
    pub estimated_affected: i32,
    pub engine_version: String,
    pub summary: String,
    pub staffing_advice: String,
    pub supply_advice: String,
    pub weather_impact: String,
    pub air_quality_impact: String,
    pub top_factors: serde_json::Value,
    pub suggested_actions: Vec<String>,
    pub suggested_medicines: Vec<String>,
    pub suggested_diseases: Vec<String>,
    pub confidence: String,
    pub active_outbreaks: serde_json::Value,
    pub features: serde_json::Value,
}

impl From<PredictionRow> for PredictionItem {
    fn from(row: PredictionRow) -> Self {
        Self {
            id: row.public_id,
            location: row.location,
            generated_at: row.generated_at,
            risk_score: row.risk_score,
            estimated_affected: row.estimated_affected,
            engine_version: row.engine_version,
            summary: row.summary,
            staffing_advice: row.staffing_advice,
            supply_advice: row.supply_advice,
            weather_impact: row.weather_impact,
            air_quality_impact: row.air_quality_impact,
            top_factors: row.top_factors,
            suggested_actions: row.suggested_actions,
            suggested_medicines: row.suggested_medicines,
            suggested_diseases: row.suggested_diseases,
            confidence: row.confidence,
            active_outbreaks: row.active_outbreaks,
            features: row.features,
        }
    }
}

/// `POST /api/v1/predictions/{location}/generate` — run the full synthesis
/// pipeline now, with forced signal refreshes (this is the user-triggered
/// path).
pub(super) async fn generate_prediction(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(location): Path<String>,
) -> Result<Json<ApiResponse<PredictionItem>>, ApiError> {
    let row = state
        .engine
        .predict(&location, true)
        .await
        .map_err(|e| map_engine_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: PredictionItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/predictions/{location}/latest` — most recent prediction,
/// auto-regenerated (non-forced signals) when absent or older than the
/// freshness threshold.
pub(super) async fn latest_prediction(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(location): Path<String>,
) -> Result<Json<ApiResponse<PredictionItem>>, ApiError> {
    let location = normalize_location_param(&req_id.0, &location)?;
    let stored = surgecast_db::latest_prediction(&state.pool, &location)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let threshold = Duration::hours(state.freshness_threshold_hours);
    let row = match stored {
        Some(row) if Utc::now() - row.generated_at < threshold => row,
        _ => state
            .engine
            .predict(&location, false)
            .await
            .map_err(|e| map_engine_error(req_id.0.clone(), &e))?,
    };

    Ok(Json(ApiResponse {
        data: PredictionItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// `GET /api/v1/predictions/{location}/history?since_days=` — predictions in
/// the window, ascending by generation time.
pub(super) async fn prediction_history(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(location): Path<String>,
    Query(query): Query<PredictionQuery>,
) -> Result<Json<ApiResponse<Vec<PredictionItem>>>, ApiError> {
    let location = normalize_location_param(&req_id.0, &location)?;
    let since = Utc::now() - Duration::days(normalize_since_days(query.since_days));

    let data: Vec<PredictionItem> =
        surgecast_db::list_predictions_since(&state.pool, &location, since)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?
            .into_iter()
            .map(PredictionItem::from)
            .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
