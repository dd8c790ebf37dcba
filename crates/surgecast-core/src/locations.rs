use std::collections::HashSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Maximum accepted length for a location name.
const MAX_LOCATION_LEN: usize = 80;

/// A location tracked by the scheduler and read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub name: String,
    /// Per-location daily admission baseline; falls back to the global default.
    pub admission_baseline: Option<f64>,
}

/// A calendar event window that raises expected patient load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub name: String,
    pub month: u32,
    pub day_start: u32,
    pub day_end: u32,
    pub multiplier: f64,
    /// Locations the event applies to; empty means all configured locations.
    #[serde(default)]
    pub locations: Vec<String>,
}

impl EventConfig {
    fn applies(&self, location: &str, date: NaiveDate) -> bool {
        if date.month() != self.month || date.day() < self.day_start || date.day() > self.day_end {
            return false;
        }
        self.locations.is_empty()
            || self
                .locations
                .iter()
                .any(|l| l.eq_ignore_ascii_case(location))
    }
}

#[derive(Debug, Deserialize)]
pub struct LocationsFile {
    pub locations: Vec<LocationConfig>,
    #[serde(default)]
    pub events: Vec<EventConfig>,
}

impl LocationsFile {
    /// Find the event covering `date` for `location`, if any.
    ///
    /// When several events overlap, the one with the highest multiplier wins.
    #[must_use]
    pub fn active_event(&self, location: &str, date: NaiveDate) -> Option<&EventConfig> {
        self.events
            .iter()
            .filter(|e| e.applies(location, date))
            .max_by(|a, b| a.multiplier.total_cmp(&b.multiplier))
    }

    /// Admission baseline for `location`, falling back to `default`.
    #[must_use]
    pub fn baseline_for(&self, location: &str, default: f64) -> f64 {
        self.locations
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(location))
            .and_then(|l| l.admission_baseline)
            .unwrap_or(default)
    }
}

/// Load and validate the locations configuration from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_locations(path: &Path) -> Result<LocationsFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LocationsFileIo {
        path: path.display().to_string(),
        source: e,
    })?;

    let file: LocationsFile = serde_yaml::from_str(&content)?;
    validate_locations(&file)?;
    Ok(file)
}

/// Normalize and validate a caller-supplied location name.
///
/// Trims surrounding whitespace and accepts 2 to 80 characters of letters,
/// digits, spaces, hyphens, apostrophes, and periods. Returns `None` for
/// anything else so callers can fail fast before any network call.
#[must_use]
pub fn normalize_location(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() < 2 || trimmed.len() > MAX_LOCATION_LEN {
        return None;
    }
    let valid = trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '\'' | '.'));
    if !valid || !trimmed.chars().any(char::is_alphabetic) {
        return None;
    }
    Some(trimmed.to_string())
}

fn validate_locations(file: &LocationsFile) -> Result<(), ConfigError> {
    if file.locations.is_empty() {
        return Err(ConfigError::Validation(
            "locations list must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for loc in &file.locations {
        if normalize_location(&loc.name).is_none() {
            return Err(ConfigError::Validation(format!(
                "invalid location name: '{}'",
                loc.name
            )));
        }
        if !seen.insert(loc.name.to_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "duplicate location: '{}'",
                loc.name
            )));
        }
        if let Some(baseline) = loc.admission_baseline {
            if baseline <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "location '{}' has non-positive admission baseline {baseline}",
                    loc.name
                )));
            }
        }
    }

    for event in &file.events {
        if event.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "event name must be non-empty".to_string(),
            ));
        }
        if !(1..=12).contains(&event.month) {
            return Err(ConfigError::Validation(format!(
                "event '{}' has invalid month {}",
                event.name, event.month
            )));
        }
        if !(1..=31).contains(&event.day_start)
            || !(1..=31).contains(&event.day_end)
            || event.day_start > event.day_end
        {
            return Err(ConfigError::Validation(format!(
                "event '{}' has invalid day range {}-{}",
                event.name, event.day_start, event.day_end
            )));
        }
        if event.multiplier <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "event '{}' has non-positive multiplier {}",
                event.name, event.multiplier
            )));
        }
    }

    Ok(())
}
