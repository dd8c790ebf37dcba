//! Database operations for the `weather_readings` and `air_quality_readings`
//! tables.
//!
//! Both tables are append-only: every successful fetch inserts exactly one
//! new row and nothing is ever updated in place. "Latest" reads select the
//! maximum `captured_at`, which also resolves concurrent writers racing to
//! persist a reading for the same location.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// Input record for inserting a weather reading.
#[derive(Debug, Clone)]
pub struct NewWeatherReading {
    pub location: String,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: Option<f64>,
    pub condition: Option<String>,
    pub source: String,
    pub raw_data: serde_json::Value,
}

/// A row from the `weather_readings` table.
///
/// `raw_data` is omitted — it is a write-only audit snapshot and not needed
/// in read-back queries.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WeatherReadingRow {
    pub id: i64,
    pub location: String,
    pub captured_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: Option<f64>,
    pub condition: Option<String>,
    pub source: String,
}

/// Input record for inserting an air-quality reading.
#[derive(Debug, Clone)]
pub struct NewAirQualityReading {
    pub location: String,
    pub aqi: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub source: String,
    pub raw_data: serde_json::Value,
}

/// A row from the `air_quality_readings` table. `raw_data` omitted as above.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AirQualityReadingRow {
    pub id: i64,
    pub location: String,
    pub captured_at: DateTime<Utc>,
    pub aqi: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    pub source: String,
}

// ---------------------------------------------------------------------------
// Weather operations
// ---------------------------------------------------------------------------

/// Insert a new weather reading and return the stored row.
///
/// `captured_at` is assigned by the database so ordering is consistent
/// across writers.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the insert fails.
pub async fn insert_weather_reading(
    pool: &PgPool,
    reading: &NewWeatherReading,
) -> Result<WeatherReadingRow, sqlx::Error> {
    sqlx::query_as::<_, WeatherReadingRow>(
        "INSERT INTO weather_readings \
             (location, temperature_c, humidity_pct, precipitation_mm, \
              wind_speed_ms, condition, source, raw_data) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8::JSONB) \
         RETURNING id, location, captured_at, temperature_c, humidity_pct, \
                   precipitation_mm, wind_speed_ms, condition, source",
    )
    .bind(&reading.location)
    .bind(reading.temperature_c)
    .bind(reading.humidity_pct)
    .bind(reading.precipitation_mm)
    .bind(reading.wind_speed_ms)
    .bind(&reading.condition)
    .bind(&reading.source)
    .bind(&reading.raw_data)
    .fetch_one(pool)
    .await
}

/// Fetch the most recent weather reading for a location, if any.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn latest_weather_reading(
    pool: &PgPool,
    location: &str,
) -> Result<Option<WeatherReadingRow>, sqlx::Error> {
    sqlx::query_as::<_, WeatherReadingRow>(
        "SELECT id, location, captured_at, temperature_c, humidity_pct, \
                precipitation_mm, wind_speed_ms, condition, source \
         FROM weather_readings \
         WHERE location = $1 \
         ORDER BY captured_at DESC \
         LIMIT 1",
    )
    .bind(location)
    .fetch_optional(pool)
    .await
}

/// List weather readings for a location captured at or after `since`,
/// ascending by capture time.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn list_weather_readings_since(
    pool: &PgPool,
    location: &str,
    since: DateTime<Utc>,
) -> Result<Vec<WeatherReadingRow>, sqlx::Error> {
    sqlx::query_as::<_, WeatherReadingRow>(
        "SELECT id, location, captured_at, temperature_c, humidity_pct, \
                precipitation_mm, wind_speed_ms, condition, source \
         FROM weather_readings \
         WHERE location = $1 AND captured_at >= $2 \
         ORDER BY captured_at ASC",
    )
    .bind(location)
    .bind(since)
    .fetch_all(pool)
    .await
}

// ---------------------------------------------------------------------------
// Air-quality operations
// ---------------------------------------------------------------------------

/// Insert a new air-quality reading and return the stored row.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the insert fails.
pub async fn insert_air_quality_reading(
    pool: &PgPool,
    reading: &NewAirQualityReading,
) -> Result<AirQualityReadingRow, sqlx::Error> {
    sqlx::query_as::<_, AirQualityReadingRow>(
        "INSERT INTO air_quality_readings \
             (location, aqi, pm25, pm10, no2, o3, source, raw_data) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8::JSONB) \
         RETURNING id, location, captured_at, aqi, pm25, pm10, no2, o3, source",
    )
    .bind(&reading.location)
    .bind(reading.aqi)
    .bind(reading.pm25)
    .bind(reading.pm10)
    .bind(reading.no2)
    .bind(reading.o3)
    .bind(&reading.source)
    .bind(&reading.raw_data)
    .fetch_one(pool)
    .await
}

/// Fetch the most recent air-quality reading for a location, if any.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn latest_air_quality_reading(
    pool: &PgPool,
    location: &str,
) -> Result<Option<AirQualityReadingRow>, sqlx::Error> {
    sqlx::query_as::<_, AirQualityReadingRow>(
        "SELECT id, location, captured_at, aqi, pm25, pm10, no2, o3, source \
         FROM air_quality_readings \
         WHERE location = $1 \
         ORDER BY captured_at DESC \
         LIMIT 1",
    )
    .bind(location)
    .fetch_optional(pool)
    .await
}

/// List air-quality readings for a location captured at or after `since`,
/// ascending by capture time.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn list_air_quality_readings_since(
    pool: &PgPool,
    location: &str,
    since: DateTime<Utc>,
) -> Result<Vec<AirQualityReadingRow>, sqlx::Error> {
    sqlx::query_as::<_, AirQualityReadingRow>(
        "SELECT id, location, captured_at, aqi, pm25, pm10, no2, o3, source \
         FROM air_quality_readings \
         WHERE location = $1 AND captured_at >= $2 \
         ORDER BY captured_at ASC",
    )
    .bind(location)
    .bind(since)
    .fetch_all(pool)
    .await
}
