use std::time::Duration;

use thiserror::Error;

use crate::retry::{FailureClass, Retryable};

/// Errors returned by the signal provider clients.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429 from the provider, with the `Retry-After` hint when present.
    #[error("rate limited by {provider}")]
    RateLimited {
        provider: &'static str,
        retry_after_secs: Option<u64>,
    },

    /// Any other non-2xx HTTP status.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The provider returned an application-level error payload.
    #[error("{provider} API error: {message}")]
    Api {
        provider: &'static str,
        message: String,
    },

    /// The provider has no data for the requested location.
    #[error("no {provider} data for location '{location}'")]
    NotFound {
        provider: &'static str,
        location: String,
    },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// No API key configured for this provider.
    #[error("missing API key for {0}")]
    MissingCredentials(&'static str),
}

impl Retryable for ProviderError {
    /// Retryable: rate limiting (with its hint), 5xx statuses, timeouts and
    /// connection failures. Everything else fails immediately — retrying a
    /// bad location or a parse mismatch won't fix it.
    fn failure_class(&self) -> FailureClass {
        match self {
            ProviderError::RateLimited {
                retry_after_secs, ..
            } => FailureClass::RateLimited {
                retry_after: retry_after_secs.map(Duration::from_secs),
            },
            ProviderError::Http(e)
                if e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error()) =>
            {
                FailureClass::Transient
            }
            ProviderError::UnexpectedStatus { status, .. } if (500..600).contains(status) => {
                FailureClass::Transient
            }
            _ => FailureClass::Permanent,
        }
    }
}
