//! Outbreak reconciliation.
//!
//! Per (location, disease) the lifecycle is: below the risk threshold
//! nothing happens; above it, a detection either creates a new record or
//! merges into the one already observed inside the dedup window. Merges are
//! commutative (max counts, union lists) so replayed or racing observations
//! converge. When a synthesis yields no detections at all, advisory-sourced
//! records older than the purge horizon are removed; authoritative records
//! never are.

use chrono::{Duration, Utc};
use sqlx::PgPool;

use surgecast_advisory::DiseaseDetection;
use surgecast_core::Severity;
use surgecast_db::{
    find_recent_outbreak, insert_outbreak, list_active_outbreaks, merge_outbreak,
    outbreaks::PROVENANCE_ADVISORY, purge_stale_advisory_outbreaks, NewOutbreak,
    OutbreakObservation, OutbreakRow,
};

use crate::error::EngineError;

/// Reconciliation tunables. The threshold and windows are heuristics carried
/// over from operational experience, not clinically validated — which is why
/// they are configuration, not constants.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    pub risk_threshold: u8,
    pub dedup_window_hours: i64,
    pub active_window_days: i64,
    pub purge_horizon_days: i64,
}

impl ReconcilerConfig {
    #[must_use]
    pub fn from_app_config(config: &surgecast_core::AppConfig) -> Self {
        Self {
            risk_threshold: config.outbreak_risk_threshold,
            dedup_window_hours: config.outbreak_dedup_window_hours,
            active_window_days: config.outbreak_active_window_days,
            purge_horizon_days: config.outbreak_purge_horizon_days,
        }
    }
}

/// Case counts derived from the risk score when a detection carries no
/// estimates of its own.
fn scaled_cases(score: u8) -> (i32, i32) {
    (i32::from(score) * 3, i32::from(score))
}

/// Reconcile this synthesis run's detections against the outbreak store and
/// return the records active inside the trailing window.
///
/// # Errors
///
/// Returns [`EngineError::Db`] if any store operation fails.
pub async fn reconcile(
    pool: &PgPool,
    config: ReconcilerConfig,
    location: &str,
    score: u8,
    detections: &[DiseaseDetection],
) -> Result<Vec<OutbreakRow>, EngineError> {
    let now = Utc::now();
    let active_since = now - Duration::days(config.active_window_days);

    if score < config.risk_threshold {
        return Ok(list_active_outbreaks(pool, location, active_since).await?);
    }

    if detections.is_empty() {
        let purge_before = now - Duration::days(config.purge_horizon_days);
        let purged = purge_stale_advisory_outbreaks(pool, location, purge_before).await?;
        if purged > 0 {
            tracing::info!(
                location,
                purged,
                "no outbreak detections; purged stale advisory records"
            );
        }
        return Ok(list_active_outbreaks(pool, location, active_since).await?);
    }

    let dedup_since = now - Duration::hours(config.dedup_window_hours);
    let (scaled_active, scaled_new) = scaled_cases(score);

    for detection in detections {
        let active_cases = detection.active_cases.unwrap_or(scaled_active).max(0);
        let new_cases = detection.new_cases.unwrap_or(scaled_new).max(0);

        match find_recent_outbreak(pool, location, &detection.name, dedup_since).await? {
            Some(existing) => {
                let merged = merge_outbreak(
                    pool,
                    existing.id,
                    &OutbreakObservation {
                        active_cases,
                        new_cases,
                        recovered: 0,
                        deaths: 0,
                        severity: detection.severity.map(|s| s.to_string()),
                        transmission_rate: detection.transmission_rate,
                        affected_groups: detection.affected_groups.clone(),
                        required_medicines: detection.medicines.clone(),
                    },
                )
                .await?;
                tracing::info!(
                    location,
                    disease = %detection.name,
                    active_cases = merged.active_cases,
                    "merged outbreak observation into existing record"
                );
            }
            None => {
                let created = insert_outbreak(
                    pool,
                    &NewOutbreak {
                        location: location.to_string(),
                        disease: detection.name.clone(),
                        active_cases,
                        new_cases,
                        recovered: 0,
                        deaths: 0,
                        severity: detection.severity.unwrap_or(Severity::Low).to_string(),
                        transmission_rate: detection.transmission_rate,
                        affected_groups: detection.affected_groups.clone(),
                        required_medicines: detection.medicines.clone(),
                        rationale: detection.rationale.clone(),
                        provenance: PROVENANCE_ADVISORY.to_string(),
                    },
                )
                .await?;
                tracing::info!(
                    location,
                    disease = %detection.name,
                    active_cases = created.active_cases,
                    "created outbreak record"
                );
            }
        }
    }

    Ok(list_active_outbreaks(pool, location, active_since).await?)
}
