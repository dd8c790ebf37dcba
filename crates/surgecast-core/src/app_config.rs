use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Immutable application configuration, built once at process start and
/// passed by reference into every component.
#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    pub locations_path: PathBuf,
    pub weather_api_url: String,
    pub weather_api_key: Option<String>,
    pub air_quality_api_url: String,
    pub air_quality_api_key: Option<String>,
    pub advisory_api_url: String,
    pub advisory_api_key: Option<String>,
    pub advisory_model: String,
    pub provider_timeout_secs: u64,
    pub provider_user_agent: String,
    pub freshness_threshold_hours: i64,
    pub refresh_cadence_hours: u32,
    pub refresh_max_concurrent: usize,
    pub retry_max_attempts: u32,
    pub retry_initial_delay_secs: u64,
    pub retry_max_delay_secs: u64,
    pub retry_backoff_multiplier: u32,
    pub outbreak_risk_threshold: u8,
    pub outbreak_dedup_window_hours: i64,
    pub outbreak_active_window_days: i64,
    pub outbreak_purge_horizon_days: i64,
    pub admission_baseline: f64,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("locations_path", &self.locations_path)
            .field("database_url", &"[redacted]")
            .field("weather_api_url", &self.weather_api_url)
            .field(
                "weather_api_key",
                &self.weather_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("air_quality_api_url", &self.air_quality_api_url)
            .field(
                "air_quality_api_key",
                &self.air_quality_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("advisory_api_url", &self.advisory_api_url)
            .field(
                "advisory_api_key",
                &self.advisory_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("advisory_model", &self.advisory_model)
            .field("provider_timeout_secs", &self.provider_timeout_secs)
            .field("provider_user_agent", &self.provider_user_agent)
            .field(
                "freshness_threshold_hours",
                &self.freshness_threshold_hours,
            )
            .field("refresh_cadence_hours", &self.refresh_cadence_hours)
            .field("refresh_max_concurrent", &self.refresh_max_concurrent)
            .field("retry_max_attempts", &self.retry_max_attempts)
            .field("retry_initial_delay_secs", &self.retry_initial_delay_secs)
            .field("retry_max_delay_secs", &self.retry_max_delay_secs)
            .field("retry_backoff_multiplier", &self.retry_backoff_multiplier)
            .field("outbreak_risk_threshold", &self.outbreak_risk_threshold)
            .field(
                "outbreak_dedup_window_hours",
                &self.outbreak_dedup_window_hours,
            )
            .field(
                "outbreak_active_window_days",
                &self.outbreak_active_window_days,
            )
            .field(
                "outbreak_purge_horizon_days",
                &self.outbreak_purge_horizon_days,
            )
            .field("admission_baseline", &self.admission_baseline)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .finish()
    }
}
