//! Freshness-aware cache controller for external readings.
//!
//! This is where the caching policy lives: serve a stored reading while it
//! is younger than the freshness threshold, otherwise (or on `force`) invoke
//! the provider and append exactly one new reading. Provider failures degrade
//! to the most recent stale reading when one exists; a missing air-quality
//! signal is estimated from the weather reading and persisted with
//! `source = "estimated"`.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;

use surgecast_core::normalize_location;
use surgecast_db::{
    insert_air_quality_reading, insert_weather_reading, latest_air_quality_reading,
    latest_weather_reading, AirQualityReadingRow, NewAirQualityReading, NewWeatherReading,
    WeatherReadingRow,
};
use surgecast_providers::{AirQualityClient, ProviderError, WeatherClient, WEATHER_SOURCE};

use crate::error::EngineError;

/// Source tag for readings synthesized by the estimation fallback.
pub const ESTIMATED_SOURCE: &str = "estimated";

/// Heuristic AQI estimate used when no provider reading is obtainable.
///
/// Warmer, drier air correlates with a higher baseline pollutant load.
/// Deterministic so the fallback path is unit-testable.
#[must_use]
pub fn estimate_aqi(temperature_c: f64, humidity_pct: f64) -> f64 {
    let mut aqi = 55.0;
    if temperature_c > 20.0 {
        aqi += (temperature_c - 20.0) * 2.5;
    }
    if humidity_pct < 40.0 {
        aqi += (40.0 - humidity_pct) * 0.5;
    }
    aqi.clamp(20.0, 250.0)
}

/// Freshness cache controller over the reading store and provider adapters.
pub struct Refresher {
    pool: PgPool,
    weather: WeatherClient,
    air_quality: AirQualityClient,
    freshness: Duration,
}

impl Refresher {
    #[must_use]
    pub fn new(
        pool: PgPool,
        weather: WeatherClient,
        air_quality: AirQualityClient,
        freshness_threshold_hours: i64,
    ) -> Self {
        Self {
            pool,
            weather,
            air_quality,
            freshness: Duration::hours(freshness_threshold_hours),
        }
    }

    fn is_fresh(&self, captured_at: DateTime<Utc>) -> bool {
        Utc::now() - captured_at < self.freshness
    }

    /// Serve or fetch the weather reading for `location`.
    ///
    /// Weather is the mandatory signal: when the provider fails and no stored
    /// reading exists at all, the failure is fatal to the caller.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidLocation`] before any network call.
    /// - [`EngineError::Provider`] with
    ///   [`ProviderError::MissingCredentials`] when no key is configured —
    ///   a stale reading is deliberately not served for a config problem.
    /// - [`EngineError::MissingMandatorySignal`] when the provider fails and
    ///   the store is empty.
    pub async fn get_or_refresh_weather(
        &self,
        location: &str,
        force: bool,
    ) -> Result<WeatherReadingRow, EngineError> {
        let location = normalize_location(location)
            .ok_or_else(|| EngineError::InvalidLocation(location.to_string()))?;

        if !force {
            if let Some(row) = latest_weather_reading(&self.pool, &location).await? {
                if self.is_fresh(row.captured_at) {
                    return Ok(row);
                }
            }
        }

        match self.weather.current(&location).await {
            Ok(obs) => {
                let row = insert_weather_reading(
                    &self.pool,
                    &NewWeatherReading {
                        location: location.clone(),
                        temperature_c: obs.temperature_c,
                        humidity_pct: obs.humidity_pct,
                        precipitation_mm: obs.precipitation_mm,
                        wind_speed_ms: obs.wind_speed_ms,
                        condition: obs.condition,
                        source: WEATHER_SOURCE.to_string(),
                        raw_data: obs.raw,
                    },
                )
                .await?;
                tracing::info!(location = %location, "stored new weather reading");
                Ok(row)
            }
            Err(err @ ProviderError::MissingCredentials(_)) => Err(EngineError::Provider(err)),
            Err(err) => {
                if let Some(stale) = latest_weather_reading(&self.pool, &location).await? {
                    tracing::warn!(
                        location = %location,
                        error = %err,
                        captured_at = %stale.captured_at,
                        "weather fetch failed; serving stale reading"
                    );
                    Ok(stale)
                } else {
                    Err(EngineError::MissingMandatorySignal {
                        location,
                        source: err,
                    })
                }
            }
        }
    }

    /// Serve or fetch the air-quality reading for `location`.
    ///
    /// Air quality is optional: when the provider fails (including a missing
    /// API key) and no stored reading exists, a heuristic estimate derived
    /// from the weather reading is persisted and returned instead. The only
    /// hard failure is weather itself being unobtainable.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidLocation`] before any network call.
    /// - Whatever [`Refresher::get_or_refresh_weather`] surfaces when the
    ///   estimation fallback cannot obtain a weather reading either.
    pub async fn get_or_refresh_air_quality(
        &self,
        location: &str,
        force: bool,
    ) -> Result<AirQualityReadingRow, EngineError> {
        let location = normalize_location(location)
            .ok_or_else(|| EngineError::InvalidLocation(location.to_string()))?;

        if !force {
            if let Some(row) = latest_air_quality_reading(&self.pool, &location).await? {
                if self.is_fresh(row.captured_at) {
                    return Ok(row);
                }
            }
        }

        match self.air_quality.current(&location).await {
            Ok(obs) => {
                let row = insert_air_quality_reading(
                    &self.pool,
                    &NewAirQualityReading {
                        location: location.clone(),
                        aqi: obs.aqi,
                        pm25: obs.pm25,
                        pm10: obs.pm10,
                        no2: obs.no2,
                        o3: obs.o3,
                        source: surgecast_providers::AIR_QUALITY_SOURCE.to_string(),
                        raw_data: obs.raw,
                    },
                )
                .await?;
                tracing::info!(location = %location, "stored new air-quality reading");
                Ok(row)
            }
            Err(err) => {
                if let Some(stale) = latest_air_quality_reading(&self.pool, &location).await? {
                    tracing::warn!(
                        location = %location,
                        error = %err,
                        captured_at = %stale.captured_at,
                        "air-quality fetch failed; serving stale reading"
                    );
                    return Ok(stale);
                }

                // No reading at all: derive an estimate from the weather
                // signal so the pipeline can continue.
                let weather = self.get_or_refresh_weather(&location, false).await?;
                let aqi = estimate_aqi(weather.temperature_c, weather.humidity_pct);
                tracing::warn!(
                    location = %location,
                    error = %err,
                    aqi,
                    "air-quality fetch failed with empty store; persisting estimated reading"
                );
                let row = insert_air_quality_reading(
                    &self.pool,
                    &NewAirQualityReading {
                        location,
                        aqi,
                        pm25: None,
                        pm10: None,
                        no2: None,
                        o3: None,
                        source: ESTIMATED_SOURCE.to_string(),
                        raw_data: serde_json::json!({
                            "estimated_from": {
                                "temperature_c": weather.temperature_c,
                                "humidity_pct": weather.humidity_pct,
                                "weather_reading_id": weather.id,
                            }
                        }),
                    },
                )
                .await?;
                Ok(row)
            }
        }
    }
}
