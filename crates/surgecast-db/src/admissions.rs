//! Read-only queries over the `admission_stats` table.
//!
//! The table is owned and populated by the hospital information system;
//! surgecast only consumes rolling averages from it.

use sqlx::PgPool;

/// Average daily admissions for a location over the trailing `days` days.
///
/// Returns `None` when no stats exist in the window, letting the caller fall
/// back to the configured baseline.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn rolling_admission_average(
    pool: &PgPool,
    location: &str,
    days: i32,
) -> Result<Option<f64>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<f64>>(
        "SELECT AVG(admission_count)::DOUBLE PRECISION \
         FROM admission_stats \
         WHERE location = $1 \
           AND stat_date >= CURRENT_DATE - $2::INT",
    )
    .bind(location)
    .bind(days)
    .fetch_one(pool)
    .await
}
