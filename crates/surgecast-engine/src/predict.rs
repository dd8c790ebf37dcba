//! The prediction assembler: features → score → advisory → reconciliation →
//! one immutable prediction row.

use serde::Serialize;
use sqlx::PgPool;

use surgecast_advisory::{Advisory, AdvisoryClient};
use surgecast_core::{normalize_location, Confidence, LocationsFile};
use surgecast_db::{insert_prediction, NewPrediction, OutbreakRow, PredictionRow};

use crate::cache::Refresher;
use crate::error::EngineError;
use crate::features::build_features;
use crate::outbreak::{reconcile, ReconcilerConfig};
use crate::risk;

/// Versioned tag persisted with every prediction.
pub const ENGINE_VERSION: &str = "surgecast-engine/0.1.0";

/// Engine tunables lifted from the application config.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub default_admission_baseline: f64,
    pub reconciler: ReconcilerConfig,
}

impl EngineConfig {
    #[must_use]
    pub fn from_app_config(config: &surgecast_core::AppConfig) -> Self {
        Self {
            default_admission_baseline: config.admission_baseline,
            reconciler: ReconcilerConfig::from_app_config(config),
        }
    }
}

/// Denormalized outbreak snapshot embedded in each prediction.
#[derive(Debug, Serialize)]
struct OutbreakSnapshot<'a> {
    disease: &'a str,
    active_cases: i32,
    new_cases: i32,
    severity: &'a str,
    observed_at: chrono::DateTime<chrono::Utc>,
    provenance: &'a str,
}

impl<'a> From<&'a OutbreakRow> for OutbreakSnapshot<'a> {
    fn from(row: &'a OutbreakRow) -> Self {
        Self {
            disease: &row.disease,
            active_cases: row.active_cases,
            new_cases: row.new_cases,
            severity: &row.severity,
            observed_at: row.observed_at,
            provenance: &row.provenance,
        }
    }
}

/// Orchestrates one synthesis pipeline per invocation.
pub struct Engine {
    pool: PgPool,
    refresher: Refresher,
    advisory: AdvisoryClient,
    locations: LocationsFile,
    config: EngineConfig,
}

impl Engine {
    #[must_use]
    pub fn new(
        pool: PgPool,
        refresher: Refresher,
        advisory: AdvisoryClient,
        locations: LocationsFile,
        config: EngineConfig,
    ) -> Self {
        Self {
            pool,
            refresher,
            advisory,
            locations,
            config,
        }
    }

    /// Read access to the freshness cache controller, for the refresh API.
    #[must_use]
    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    /// Run the full synthesis pipeline for a location and persist one
    /// prediction.
    ///
    /// A degraded advisory or an empty reconciliation never aborts the run;
    /// only an unobtainable weather signal (or a store failure) does.
    ///
    /// # Errors
    ///
    /// - [`EngineError::InvalidLocation`] before any work is done.
    /// - [`EngineError::MissingMandatorySignal`] when weather cannot be
    ///   obtained even after a forced attempt and no stored reading exists.
    /// - [`EngineError::Synthesis`] when the prediction row cannot be
    ///   persisted.
    pub async fn predict(
        &self,
        location: &str,
        force_signals: bool,
    ) -> Result<PredictionRow, EngineError> {
        let location = normalize_location(location)
            .ok_or_else(|| EngineError::InvalidLocation(location.to_string()))?;

        let features = build_features(
            &self.pool,
            &self.refresher,
            &self.locations,
            self.config.default_admission_baseline,
            &location,
            force_signals,
        )
        .await?;

        let breakdown = risk::score_features(&features);

        let context = serde_json::json!({
            "features": features,
            "risk_score": breakdown.score,
        });
        let advisory = match self.advisory.synthesize(&context).await {
            Ok(advisory) => advisory,
            Err(err) => {
                // The pipeline always produces a prediction; an unreachable
                // reasoning service degrades like a malformed reply does.
                tracing::warn!(
                    location = %location,
                    error = %err,
                    "advisory synthesis failed; continuing with degraded advisory"
                );
                Advisory::Degraded {
                    raw: format!("advisory unavailable: {err}"),
                }
            }
        };

        let outbreaks = reconcile(
            &self.pool,
            self.config.reconciler,
            &location,
            breakdown.score,
            advisory.detections(),
        )
        .await?;

        let total_active_cases: i64 = outbreaks.iter().map(|o| i64::from(o.active_cases)).sum();
        let estimated_affected = estimated_affected(
            features.admission_baseline,
            breakdown.score,
            total_active_cases,
        );

        let prediction = assemble(
            &location,
            &features,
            &breakdown,
            &advisory,
            &outbreaks,
            estimated_affected,
        )?;

        let row = insert_prediction(&self.pool, &prediction)
            .await
            .map_err(EngineError::Synthesis)?;
        tracing::info!(
            location = %location,
            risk_score = breakdown.score,
            estimated_affected,
            outbreaks = outbreaks.len(),
            "prediction generated"
        );
        Ok(row)
    }
}

fn assemble(
    location: &str,
    features: &crate::features::FeatureRecord,
    breakdown: &risk::ScoreBreakdown,
    advisory: &Advisory,
    outbreaks: &[OutbreakRow],
    estimated_affected: i32,
) -> Result<NewPrediction, EngineError> {
    let snapshots: Vec<OutbreakSnapshot<'_>> =
        outbreaks.iter().map(OutbreakSnapshot::from).collect();

    let (
        summary,
        staffing_advice,
        supply_advice,
        weather_impact,
        air_quality_impact,
        suggested_actions,
        advisory_medicines,
        suggested_diseases,
        confidence,
    ) = match advisory {
        Advisory::Structured(p) => (
            p.summary.clone(),
            p.staffing_plan.clone(),
            p.supply_plan.clone(),
            p.weather_impact.clone(),
            p.air_quality_impact.clone(),
            p.suggested_actions.clone(),
            p.suggested_medicines.clone(),
            p.suggested_diseases
                .iter()
                .map(|d| d.name.clone())
                .collect(),
            p.confidence,
        ),
        Advisory::Degraded { raw } => (
            raw.clone(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Confidence::Low,
        ),
    };

    let suggested_medicines = union_medicines(&advisory_medicines, outbreaks);

    Ok(NewPrediction {
        location: location.to_string(),
        risk_score: i16::from(breakdown.score),
        estimated_affected,
        engine_version: ENGINE_VERSION.to_string(),
        features: serde_json::to_value(features)?,
        summary,
        staffing_advice,
        supply_advice,
        weather_impact,
        air_quality_impact,
        top_factors: serde_json::to_value(&breakdown.factors)?,
        suggested_actions,
        suggested_medicines,
        suggested_diseases,
        confidence: confidence.to_string(),
        active_outbreaks: serde_json::to_value(&snapshots)?,
    })
}

/// Expected affected count: the admission baseline inflated by risk, plus a
/// share of the currently active outbreak cases, never below the baseline.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
#[must_use]
pub fn estimated_affected(baseline: f64, score: u8, total_active_cases: i64) -> i32 {
    let raw = baseline * (1.0 + f64::from(score) / 100.0 * 0.5) + 0.3 * total_active_cases as f64;
    raw.max(baseline).round().max(0.0) as i32
}

/// Union of advisory medicines and the required medicines of active
/// outbreaks, case-insensitively deduplicated, first occurrence wins.
#[must_use]
pub fn union_medicines(advisory: &[String], outbreaks: &[OutbreakRow]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut merged = Vec::new();
    for medicine in advisory
        .iter()
        .chain(outbreaks.iter().flat_map(|o| o.required_medicines.iter()))
    {
        if seen.insert(medicine.to_lowercase()) {
            merged.push(medicine.clone());
        }
    }
    merged
}
