//! Database operations for the `predictions` table.
//!
//! Predictions are immutable: the assembler inserts exactly one row per
//! synthesis run and "latest" is the maximum `generated_at` per location.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Input record for inserting a prediction.
#[derive(Debug, Clone)]
pub struct NewPrediction {
    pub location: String,
    pub risk_score: i16,
    pub estimated_affected: i32,
    pub engine_version: String,
    /// Flattened feature snapshot the score was derived from.
    pub features: serde_json::Value,
    pub summary: String,
    pub staffing_advice: String,
    pub supply_advice: String,
    pub weather_impact: String,
    pub air_quality_impact: String,
    /// Ranked contributing factors, `[{"name": ..., "points": ...}]`.
    pub top_factors: serde_json::Value,
    pub suggested_actions: Vec<String>,
    pub suggested_medicines: Vec<String>,
    pub suggested_diseases: Vec<String>,
    pub confidence: String,
    /// Denormalized snapshot of the active outbreak records at synthesis time.
    pub active_outbreaks: serde_json::Value,
}

/// A row from the `predictions` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PredictionRow {
    pub id: i64,
    pub public_id: Uuid,
    pub location: String,
    pub generated_at: DateTime<Utc>,
    pub risk_score: i16,
    pub estimated_affected: i32,
    pub engine_version: String,
    pub features: serde_json::Value,
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
    pub created_at: DateTime<Utc>,
}

const PREDICTION_COLUMNS: &str = "id, public_id, location, generated_at, risk_score, \
     estimated_affected, engine_version, features, summary, staffing_advice, \
     supply_advice, weather_impact, air_quality_impact, top_factors, \
     suggested_actions, suggested_medicines, suggested_diseases, confidence, \
     active_outbreaks, created_at";

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Insert a new prediction and return the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_prediction(
    pool: &PgPool,
    prediction: &NewPrediction,
) -> Result<PredictionRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, PredictionRow>(&format!(
        "INSERT INTO predictions \
             (public_id, location, risk_score, estimated_affected, engine_version, \
              features, summary, staffing_advice, supply_advice, weather_impact, \
              air_quality_impact, top_factors, suggested_actions, \
              suggested_medicines, suggested_diseases, confidence, active_outbreaks) \
         VALUES ($1, $2, $3, $4, $5, $6::JSONB, $7, $8, $9, $10, $11, $12::JSONB, \
                 $13, $14, $15, $16, $17::JSONB) \
         RETURNING {PREDICTION_COLUMNS}"
    ))
    .bind(public_id)
    .bind(&prediction.location)
    .bind(prediction.risk_score)
    .bind(prediction.estimated_affected)
    .bind(&prediction.engine_version)
    .bind(&prediction.features)
    .bind(&prediction.summary)
    .bind(&prediction.staffing_advice)
    .bind(&prediction.supply_advice)
    .bind(&prediction.weather_impact)
    .bind(&prediction.air_quality_impact)
    .bind(&prediction.top_factors)
    .bind(&prediction.suggested_actions)
    .bind(&prediction.suggested_medicines)
    .bind(&prediction.suggested_diseases)
    .bind(&prediction.confidence)
    .bind(&prediction.active_outbreaks)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Fetch the most recent prediction for a location, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_prediction(
    pool: &PgPool,
    location: &str,
) -> Result<Option<PredictionRow>, DbError> {
    let row = sqlx::query_as::<_, PredictionRow>(&format!(
        "SELECT {PREDICTION_COLUMNS} \
         FROM predictions \
         WHERE location = $1 \
         ORDER BY generated_at DESC \
         LIMIT 1"
    ))
    .bind(location)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// List predictions for a location generated at or after `since`, ascending
/// by generation time.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_predictions_since(
    pool: &PgPool,
    location: &str,
    since: DateTime<Utc>,
) -> Result<Vec<PredictionRow>, DbError> {
    let rows = sqlx::query_as::<_, PredictionRow>(&format!(
        "SELECT {PREDICTION_COLUMNS} \
         FROM predictions \
         WHERE location = $1 AND generated_at >= $2 \
         ORDER BY generated_at ASC"
    ))
    .bind(location)
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
