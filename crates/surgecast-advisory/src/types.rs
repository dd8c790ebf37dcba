use serde::{Deserialize, Serialize};
use surgecast_core::{Confidence, Severity};

/// One disease the reasoning service flags as a plausible outbreak driver.
///
/// All estimate fields are optional; the reconciler scales missing counts
/// from the risk score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiseaseDetection {
    pub name: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub transmission_rate: Option<f64>,
    #[serde(default)]
    pub active_cases: Option<i32>,
    #[serde(default)]
    pub new_cases: Option<i32>,
    #[serde(default)]
    pub affected_groups: Vec<String>,
    #[serde(default)]
    pub medicines: Vec<String>,
    #[serde(default)]
    pub rationale: Option<String>,
}

/// The fixed response schema requested from the reasoning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryPayload {
    pub summary: String,
    #[serde(default)]
    pub staffing_plan: String,
    #[serde(default)]
    pub supply_plan: String,
    #[serde(default)]
    pub suggested_actions: Vec<String>,
    #[serde(default)]
    pub suggested_medicines: Vec<String>,
    #[serde(default)]
    pub suggested_diseases: Vec<DiseaseDetection>,
    #[serde(default)]
    pub weather_impact: String,
    #[serde(default)]
    pub air_quality_impact: String,
    #[serde(default = "Advisory::degraded_confidence")]
    pub confidence: Confidence,
}

/// Result of one synthesis call.
///
/// `Degraded` carries the raw reply text when it cannot be parsed into
/// [`AdvisoryPayload`]; structured fields then default to empty and the
/// confidence is forced to the lowest tier.
#[derive(Debug, Clone)]
pub enum Advisory {
    Structured(AdvisoryPayload),
    Degraded { raw: String },
}

impl Advisory {
    /// Parse a reply body into an advisory. Tolerates Markdown code fences
    /// around the JSON; anything unparseable becomes `Degraded`.
    #[must_use]
    pub fn parse(content: &str) -> Advisory {
        let stripped = strip_code_fences(content);
        match serde_json::from_str::<AdvisoryPayload>(stripped) {
            Ok(payload) => Advisory::Structured(payload),
            Err(_) => Advisory::Degraded {
                raw: content.trim().to_string(),
            },
        }
    }

    /// Narrative summary; for a degraded advisory this is the raw text.
    #[must_use]
    pub fn summary(&self) -> &str {
        match self {
            Advisory::Structured(p) => &p.summary,
            Advisory::Degraded { raw } => raw,
        }
    }

    #[must_use]
    pub fn confidence(&self) -> Confidence {
        match self {
            Advisory::Structured(p) => p.confidence,
            Advisory::Degraded { .. } => Confidence::Low,
        }
    }

    /// Disease detections; empty for a degraded advisory.
    #[must_use]
    pub fn detections(&self) -> &[DiseaseDetection] {
        match self {
            Advisory::Structured(p) => &p.suggested_diseases,
            Advisory::Degraded { .. } => &[],
        }
    }

    fn degraded_confidence() -> Confidence {
        Confidence::Low
    }
}

/// Strip a surrounding ```/```json fence, if present.
fn strip_code_fences(s: &str) -> &str {
    let trimmed = s.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start()
        .strip_suffix("```")
        .map_or(trimmed, str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structured_body() -> String {
        serde_json::json!({
            "summary": "Respiratory load expected to rise",
            "staffing_plan": "Add one pulmonology resident per night shift",
            "supply_plan": "Stock nebulizer kits",
            "suggested_actions": ["Open overflow beds"],
            "suggested_medicines": ["Salbutamol", "Budesonide"],
            "suggested_diseases": [
                {
                    "name": "Influenza",
                    "severity": "moderate",
                    "transmission_rate": 1.4,
                    "medicines": ["Oseltamivir"]
                }
            ],
            "weather_impact": "Heat stress is limited",
            "air_quality_impact": "High AQI drives asthma presentations",
            "confidence": "high"
        })
        .to_string()
    }

    #[test]
    fn parse_structured_payload() {
        let advisory = Advisory::parse(&structured_body());
        let Advisory::Structured(payload) = advisory else {
            panic!("expected structured advisory");
        };
        assert_eq!(payload.summary, "Respiratory load expected to rise");
        assert_eq!(payload.suggested_diseases.len(), 1);
        assert_eq!(payload.suggested_diseases[0].name, "Influenza");
        assert_eq!(
            payload.suggested_diseases[0].severity,
            Some(Severity::Moderate)
        );
        assert_eq!(payload.confidence, Confidence::High);
    }

    #[test]
    fn parse_tolerates_code_fences() {
        let fenced = format!("```json\n{}\n```", structured_body());
        let advisory = Advisory::parse(&fenced);
        assert!(matches!(advisory, Advisory::Structured(_)));
    }

    #[test]
    fn parse_falls_back_to_degraded() {
        let advisory = Advisory::parse("Expect a busy week in the ED.");
        let Advisory::Degraded { ref raw } = advisory else {
            panic!("expected degraded advisory");
        };
        assert_eq!(raw, "Expect a busy week in the ED.");
        assert_eq!(advisory.confidence(), Confidence::Low);
        assert!(advisory.detections().is_empty());
        assert_eq!(advisory.summary(), "Expect a busy week in the ED.");
    }

    #[test]
    fn parse_defaults_optional_fields() {
        let minimal = serde_json::json!({ "summary": "quiet" }).to_string();
        let Advisory::Structured(payload) = Advisory::parse(&minimal) else {
            panic!("expected structured advisory");
        };
        assert!(payload.staffing_plan.is_empty());
        assert!(payload.suggested_medicines.is_empty());
        assert!(payload.suggested_diseases.is_empty());
        assert_eq!(payload.confidence, Confidence::Low);
    }

    #[test]
    fn unterminated_fence_is_degraded() {
        let advisory = Advisory::parse("```json\n{\"summary\": \"x\"}");
        assert!(matches!(advisory, Advisory::Degraded { .. }));
    }
}
