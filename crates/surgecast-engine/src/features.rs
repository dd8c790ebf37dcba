//! Assembly of the flat feature snapshot consumed by the risk scorer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use surgecast_core::LocationsFile;
use surgecast_db::rolling_admission_average;

use crate::cache::Refresher;
use crate::error::EngineError;

/// Trailing window for the rolling admission average, in days.
pub const ROLLING_WINDOW_DAYS: i32 = 7;

/// Flattened input to the risk scorer. Ephemeral — it only exists within one
/// synthesis invocation, though the assembler snapshots it into the
/// prediction for audit.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureRecord {
    pub location: String,
    pub generated_at: DateTime<Utc>,
    pub aqi: f64,
    pub pm25: Option<f64>,
    pub air_quality_source: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: Option<f64>,
    pub condition: Option<String>,
    pub admission_avg_7d: f64,
    pub admission_baseline: f64,
    pub event_name: Option<String>,
    /// Zero when no calendar event covers today.
    pub event_multiplier: f64,
}

/// Build the feature record for one location.
///
/// Resolves both readings through the freshness cache (`force` is passed
/// through for user-triggered synthesis), the rolling admission average
/// (configured baseline when no history exists), and today's calendar event.
///
/// # Errors
///
/// Fails only if the mandatory weather reading cannot be obtained even after
/// a forced attempt — see [`Refresher::get_or_refresh_weather`].
pub async fn build_features(
    pool: &PgPool,
    refresher: &Refresher,
    locations: &LocationsFile,
    default_baseline: f64,
    location: &str,
    force: bool,
) -> Result<FeatureRecord, EngineError> {
    let weather = refresher.get_or_refresh_weather(location, force).await?;
    let air_quality = refresher.get_or_refresh_air_quality(location, force).await?;

    let baseline = locations.baseline_for(&weather.location, default_baseline);
    let admission_avg_7d =
        rolling_admission_average(pool, &weather.location, ROLLING_WINDOW_DAYS)
            .await?
            .unwrap_or(baseline);

    let now = Utc::now();
    let event = locations.active_event(&weather.location, now.date_naive());

    Ok(FeatureRecord {
        location: weather.location.clone(),
        generated_at: now,
        aqi: air_quality.aqi,
        pm25: air_quality.pm25,
        air_quality_source: air_quality.source,
        temperature_c: weather.temperature_c,
        humidity_pct: weather.humidity_pct,
        precipitation_mm: weather.precipitation_mm,
        wind_speed_ms: weather.wind_speed_ms,
        condition: weather.condition,
        admission_avg_7d,
        admission_baseline: baseline,
        event_name: event.map(|e| e.name.clone()),
        event_multiplier: event.map_or(0.0, |e| e.multiplier),
    })
}
