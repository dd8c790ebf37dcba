use std::time::Duration;

use thiserror::Error;

use surgecast_providers::{FailureClass, Retryable};

/// Errors returned by the reasoning-service client.
///
/// Note that a reply that fails to parse into the advisory schema is NOT an
/// error — it degrades to [`crate::Advisory::Degraded`]. These variants cover
/// transport and envelope failures only.
#[derive(Debug, Error)]
pub enum AdvisoryError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 from the service, with the `Retry-After` hint when present.
    #[error("rate limited by reasoning service")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Any other non-2xx HTTP status.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The completion envelope itself could not be deserialized.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The service returned no choices.
    #[error("reasoning service returned an empty response")]
    EmptyResponse,

    /// No API key configured for the reasoning service.
    #[error("missing API key for the reasoning service")]
    MissingCredentials,

    /// The configured base URL is not a valid URL.
    #[error("invalid reasoning-service base URL: {0}")]
    InvalidBaseUrl(String),
}

impl Retryable for AdvisoryError {
    fn failure_class(&self) -> FailureClass {
        match self {
            AdvisoryError::RateLimited { retry_after_secs } => FailureClass::RateLimited {
                retry_after: retry_after_secs.map(Duration::from_secs),
            },
            AdvisoryError::Http(e)
                if e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error()) =>
            {
                FailureClass::Transient
            }
            AdvisoryError::UnexpectedStatus { status, .. } if (500..600).contains(status) => {
                FailureClass::Transient
            }
            _ => FailureClass::Permanent,
        }
    }
}
