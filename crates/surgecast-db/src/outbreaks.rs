//! Database operations for the `outbreak_records` table.
//!
//! Within the dedup window at most one record per (location, disease) is
//! current; later observations merge into it. Merges only move counts up
//! (`GREATEST`) and union list fields, so applying the same observation
//! twice, or two observations in either order, converges to the same row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// Provenance tag for reconciler-created records. Records with any other
/// provenance are treated as authoritative and are never purged.
pub const PROVENANCE_ADVISORY: &str = "advisory";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `outbreak_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutbreakRow {
    pub id: i64,
    pub public_id: Uuid,
    pub location: String,
    pub disease: String,
    pub observed_at: DateTime<Utc>,
    pub active_cases: i32,
    pub new_cases: i32,
    pub recovered: i32,
    pub deaths: i32,
    pub severity: String,
    pub transmission_rate: Option<f64>,
    pub affected_groups: Vec<String>,
    pub required_medicines: Vec<String>,
    pub rationale: Option<String>,
    pub provenance: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input record for inserting a new outbreak record.
#[derive(Debug, Clone)]
pub struct NewOutbreak {
    pub location: String,
    pub disease: String,
    pub active_cases: i32,
    pub new_cases: i32,
    pub recovered: i32,
    pub deaths: i32,
    pub severity: String,
    pub transmission_rate: Option<f64>,
    pub affected_groups: Vec<String>,
    pub required_medicines: Vec<String>,
    pub rationale: Option<String>,
    pub provenance: String,
}

/// A later observation merged into an existing record.
#[derive(Debug, Clone)]
pub struct OutbreakObservation {
    pub active_cases: i32,
    pub new_cases: i32,
    pub recovered: i32,
    pub deaths: i32,
    /// New severity, when the observation carries one.
    pub severity: Option<String>,
    pub transmission_rate: Option<f64>,
    pub affected_groups: Vec<String>,
    pub required_medicines: Vec<String>,
}

const OUTBREAK_COLUMNS: &str = "id, public_id, location, disease, observed_at, \
     active_cases, new_cases, recovered, deaths, severity, transmission_rate, \
     affected_groups, required_medicines, rationale, provenance, created_at, updated_at";

// ---------------------------------------------------------------------------
// Read operations
// ---------------------------------------------------------------------------

/// List records for a location observed at or after `since`, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_outbreaks(
    pool: &PgPool,
    location: &str,
    since: DateTime<Utc>,
) -> Result<Vec<OutbreakRow>, DbError> {
    let rows = sqlx::query_as::<_, OutbreakRow>(&format!(
        "SELECT {OUTBREAK_COLUMNS} \
         FROM outbreak_records \
         WHERE location = $1 AND observed_at >= $2 \
         ORDER BY observed_at DESC"
    ))
    .bind(location)
    .bind(since)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Find the current record for (location, disease) observed at or after
/// `since`, if one exists.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_recent_outbreak(
    pool: &PgPool,
    location: &str,
    disease: &str,
    since: DateTime<Utc>,
) -> Result<Option<OutbreakRow>, DbError> {
    let row = sqlx::query_as::<_, OutbreakRow>(&format!(
        "SELECT {OUTBREAK_COLUMNS} \
         FROM outbreak_records \
         WHERE location = $1 AND disease = $2 AND observed_at >= $3 \
         ORDER BY observed_at DESC \
         LIMIT 1"
    ))
    .bind(location)
    .bind(disease)
    .bind(since)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Write operations
// ---------------------------------------------------------------------------

/// Insert a new outbreak record and return the stored row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_outbreak(pool: &PgPool, record: &NewOutbreak) -> Result<OutbreakRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, OutbreakRow>(&format!(
        "INSERT INTO outbreak_records \
             (public_id, location, disease, active_cases, new_cases, recovered, \
              deaths, severity, transmission_rate, affected_groups, \
              required_medicines, rationale, provenance) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         RETURNING {OUTBREAK_COLUMNS}"
    ))
    .bind(public_id)
    .bind(&record.location)
    .bind(&record.disease)
    .bind(record.active_cases)
    .bind(record.new_cases)
    .bind(record.recovered)
    .bind(record.deaths)
    .bind(&record.severity)
    .bind(record.transmission_rate)
    .bind(&record.affected_groups)
    .bind(&record.required_medicines)
    .bind(&record.rationale)
    .bind(&record.provenance)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Merge a later observation into an existing record.
///
/// Counts take the maximum of old and new, severity and transmission rate
/// take the new value when provided, list fields are deduplicating unions.
/// `observed_at` is left untouched — the record's identity window is anchored
/// to the first observation.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if `id` does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn merge_outbreak(
    pool: &PgPool,
    id: i64,
    observation: &OutbreakObservation,
) -> Result<OutbreakRow, DbError> {
    let row = sqlx::query_as::<_, OutbreakRow>(&format!(
        "UPDATE outbreak_records SET \
             active_cases       = GREATEST(active_cases, $2), \
             new_cases          = GREATEST(new_cases, $3), \
             recovered          = GREATEST(recovered, $4), \
             deaths             = GREATEST(deaths, $5), \
             severity           = COALESCE($6, severity), \
             transmission_rate  = COALESCE($7, transmission_rate), \
             affected_groups    = ARRAY(SELECT DISTINCT g FROM unnest(affected_groups || $8::TEXT[]) AS g ORDER BY g), \
             required_medicines = ARRAY(SELECT DISTINCT m FROM unnest(required_medicines || $9::TEXT[]) AS m ORDER BY m), \
             updated_at         = NOW() \
         WHERE id = $1 \
         RETURNING {OUTBREAK_COLUMNS}"
    ))
    .bind(id)
    .bind(observation.active_cases)
    .bind(observation.new_cases)
    .bind(observation.recovered)
    .bind(observation.deaths)
    .bind(&observation.severity)
    .bind(observation.transmission_rate)
    .bind(&observation.affected_groups)
    .bind(&observation.required_medicines)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Delete advisory-sourced records for a location observed before `before`.
///
/// Authoritative records (any other provenance) are never touched. Returns
/// the number of rows removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn purge_stale_advisory_outbreaks(
    pool: &PgPool,
    location: &str,
    before: DateTime<Utc>,
) -> Result<u64, DbError> {
    let result = sqlx::query(
        "DELETE FROM outbreak_records \
         WHERE location = $1 \
           AND provenance = $2 \
           AND observed_at < $3",
    )
    .bind(location)
    .bind(PROVENANCE_ADVISORY)
    .bind(before)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
