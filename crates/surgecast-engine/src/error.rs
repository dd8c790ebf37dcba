use thiserror::Error;

use surgecast_db::DbError;
use surgecast_providers::ProviderError;

/// Errors surfaced by the engine's read and synthesis pipelines.
///
/// Partial degradation — an estimated air-quality reading, a degraded
/// advisory, zero outbreak detections — is handled internally and never
/// appears here.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The location name failed validation; nothing was fetched.
    #[error("invalid location: '{0}'")]
    InvalidLocation(String),

    /// The mandatory weather signal could not be obtained and no stored
    /// reading exists to fall back on.
    #[error("no weather data obtainable for '{location}'")]
    MissingMandatorySignal {
        location: String,
        #[source]
        source: ProviderError,
    },

    /// A provider call failed in a way the caller must see (for example
    /// missing credentials on a forced refresh).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Db(#[from] DbError),

    /// The assembled prediction could not be persisted.
    #[error("failed to persist prediction: {0}")]
    Synthesis(#[source] DbError),

    #[error("failed to serialize prediction payload: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<sqlx::Error> for EngineError {
    fn from(e: sqlx::Error) -> Self {
        EngineError::Db(DbError::from(e))
    }
}
