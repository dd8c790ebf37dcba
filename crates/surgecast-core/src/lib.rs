use serde::{Deserialize, Serialize};
use thiserror::Error;

mod app_config;
mod config;
mod locations;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use locations::{
    load_locations, normalize_location, EventConfig, LocationConfig, LocationsFile,
};

/// The two external signal types surgecast tracks per location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    AirQuality,
    Weather,
}

impl SignalKind {
    /// All signal kinds, in scheduler fan-out order.
    pub const ALL: [SignalKind; 2] = [SignalKind::Weather, SignalKind::AirQuality];
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::AirQuality => write!(f, "air-quality"),
            SignalKind::Weather => write!(f, "weather"),
        }
    }
}

impl std::str::FromStr for SignalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "air-quality" | "air_quality" | "aqi" => Ok(SignalKind::AirQuality),
            "weather" => Ok(SignalKind::Weather),
            other => Err(format!("unknown signal kind: '{other}'")),
        }
    }
}

/// Outbreak severity tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Moderate => write!(f, "moderate"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Advisory confidence tiers. Degraded advisories are forced to `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::Low => write!(f, "low"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::High => write!(f, "high"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
    #[error("failed to read locations file at {path}: {source}")]
    LocationsFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse locations file: {0}")]
    LocationsFileParse(#[from] serde_yaml::Error),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}
