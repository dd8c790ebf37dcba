//! Deterministic surge risk scoring.
//!
//! Pure functions over a [`FeatureRecord`] — no I/O, no clock, no
//! randomness — so identical inputs always yield the identical score.

use serde::Serialize;

use crate::features::FeatureRecord;

/// Every score starts here; contributions are added on top and the total is
/// clamped to [0, 100].
pub const BASE_SCORE: f64 = 20.0;

/// One ranked contribution to the final score.
#[derive(Debug, Clone, Serialize)]
pub struct Factor {
    pub name: String,
    pub points: f64,
}

/// The bounded score plus its contributing factors, largest first.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    pub score: u8,
    pub factors: Vec<Factor>,
}

/// Score a feature record.
///
/// Contributions: AQI tier (>150: +25, >100: +15, >50: +5, mutually
/// exclusive), temperature above 35 °C (+15), humidity above 80% (+10),
/// precipitation above 5 mm (+5), rolling admissions above 1.2× baseline
/// (+20), and an active calendar event (multiplier × 10).
#[must_use]
pub fn score_features(features: &FeatureRecord) -> ScoreBreakdown {
    let mut factors = Vec::new();

    let aqi_points = if features.aqi > 150.0 {
        25.0
    } else if features.aqi > 100.0 {
        15.0
    } else if features.aqi > 50.0 {
        5.0
    } else {
        0.0
    };
    if aqi_points > 0.0 {
        factors.push(Factor {
            name: "air quality index".to_string(),
            points: aqi_points,
        });
    }

    if features.temperature_c > 35.0 {
        factors.push(Factor {
            name: "extreme heat".to_string(),
            points: 15.0,
        });
    }

    if features.humidity_pct > 80.0 {
        factors.push(Factor {
            name: "high humidity".to_string(),
            points: 10.0,
        });
    }

    if features.precipitation_mm > 5.0 {
        factors.push(Factor {
            name: "heavy precipitation".to_string(),
            points: 5.0,
        });
    }

    if features.admission_avg_7d > 1.2 * features.admission_baseline {
        factors.push(Factor {
            name: "elevated admissions".to_string(),
            points: 20.0,
        });
    }

    if features.event_multiplier > 0.0 {
        let name = features
            .event_name
            .clone()
            .unwrap_or_else(|| "calendar event".to_string());
        factors.push(Factor {
            name,
            points: features.event_multiplier * 10.0,
        });
    }

    let total: f64 = BASE_SCORE + factors.iter().map(|f| f.points).sum::<f64>();
    factors.sort_by(|a, b| b.points.total_cmp(&a.points));

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let score = total.clamp(0.0, 100.0).round() as u8;

    ScoreBreakdown { score, factors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn baseline_features() -> FeatureRecord {
        FeatureRecord {
            location: "Delhi".to_string(),
            generated_at: Utc::now(),
            aqi: 40.0,
            pm25: None,
            air_quality_source: "waqi".to_string(),
            temperature_c: 22.0,
            humidity_pct: 40.0,
            precipitation_mm: 0.0,
            wind_speed_ms: None,
            condition: None,
            admission_avg_7d: 100.0,
            admission_baseline: 100.0,
            event_name: None,
            event_multiplier: 0.0,
        }
    }

    #[test]
    fn calm_conditions_stay_at_base_score() {
        let breakdown = score_features(&baseline_features());
        assert_eq!(breakdown.score, 20);
        assert!(breakdown.factors.is_empty());
    }

    #[test]
    fn delhi_high_aqi_scenario_scores_45() {
        // Pollutant index 180, temperature 22°, humidity 40%, no events,
        // admissions at baseline: 20 base + 25 for the top AQI tier.
        let mut features = baseline_features();
        features.aqi = 180.0;
        let breakdown = score_features(&features);
        assert_eq!(breakdown.score, 45);
        assert_eq!(breakdown.factors.len(), 1);
        assert_eq!(breakdown.factors[0].name, "air quality index");
    }

    #[test]
    fn aqi_tiers_are_mutually_exclusive() {
        let mut features = baseline_features();

        features.aqi = 160.0;
        assert_eq!(score_features(&features).score, 45);

        features.aqi = 120.0;
        assert_eq!(score_features(&features).score, 35);

        features.aqi = 60.0;
        assert_eq!(score_features(&features).score, 25);

        features.aqi = 50.0;
        assert_eq!(score_features(&features).score, 20, "50 is not above 50");
    }

    #[test]
    fn weather_contributions_are_additive() {
        let mut features = baseline_features();
        features.temperature_c = 36.0;
        features.humidity_pct = 85.0;
        features.precipitation_mm = 8.0;
        // 20 + 15 + 10 + 5
        assert_eq!(score_features(&features).score, 50);
    }

    #[test]
    fn elevated_admissions_add_twenty() {
        let mut features = baseline_features();
        features.admission_avg_7d = 121.0;
        assert_eq!(score_features(&features).score, 40);

        // Exactly 1.2x is not "exceeding".
        features.admission_avg_7d = 120.0;
        assert_eq!(score_features(&features).score, 20);
    }

    #[test]
    fn event_contribution_scales_with_multiplier() {
        let mut features = baseline_features();
        features.event_name = Some("Diwali".to_string());
        features.event_multiplier = 1.5;
        let breakdown = score_features(&features);
        assert_eq!(breakdown.score, 35);
        assert!(breakdown.factors.iter().any(|f| f.name == "Diwali"));
    }

    #[test]
    fn score_is_clamped_to_100() {
        let mut features = baseline_features();
        features.aqi = 400.0;
        features.temperature_c = 45.0;
        features.humidity_pct = 95.0;
        features.precipitation_mm = 30.0;
        features.admission_avg_7d = 500.0;
        features.event_name = Some("Kumbh Mela".to_string());
        features.event_multiplier = 5.0;
        let breakdown = score_features(&features);
        assert_eq!(breakdown.score, 100);
    }

    #[test]
    fn factors_are_ranked_descending() {
        let mut features = baseline_features();
        features.aqi = 180.0;
        features.precipitation_mm = 8.0;
        features.humidity_pct = 85.0;
        let breakdown = score_features(&features);
        let points: Vec<f64> = breakdown.factors.iter().map(|f| f.points).collect();
        assert_eq!(points, vec![25.0, 10.0, 5.0]);
    }

    #[test]
    fn scoring_is_pure() {
        let mut features = baseline_features();
        features.aqi = 180.0;
        features.humidity_pct = 85.0;
        let first = score_features(&features);
        let second = score_features(&features);
        assert_eq!(first.score, second.score);
        assert_eq!(first.factors.len(), second.factors.len());
    }
}
