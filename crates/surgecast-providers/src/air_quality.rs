//! HTTP client for the WAQI city-feed API.
//!
//! WAQI wraps every response in a `{"status": ..., "data": ...}` envelope;
//! `status: "error"` carries the message in `data`. Unknown stations map to
//! [`ProviderError::NotFound`] so the cache layer can fall back to an
//! estimated reading.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::ProviderError;
use crate::retry::{self, RetryPolicy};

const DEFAULT_BASE_URL: &str = "https://api.waqi.info";

/// Source tag written to readings fetched from this provider.
pub const AIR_QUALITY_SOURCE: &str = "waqi";

const PROVIDER: &str = "waqi";

/// A normalized air-quality observation for one location.
#[derive(Debug, Clone)]
pub struct AirQualityObservation {
    /// Composite air-quality index (the provider's dominant-pollutant AQI).
    pub aqi: f64,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub no2: Option<f64>,
    pub o3: Option<f64>,
    /// Raw provider payload, persisted for audit.
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WaqiEnvelope {
    status: String,
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WaqiData {
    aqi: f64,
    #[serde(default)]
    iaqi: WaqiIaqi,
}

#[derive(Debug, Default, Deserialize)]
struct WaqiIaqi {
    #[serde(default)]
    pm25: Option<WaqiValue>,
    #[serde(default)]
    pm10: Option<WaqiValue>,
    #[serde(default)]
    no2: Option<WaqiValue>,
    #[serde(default)]
    o3: Option<WaqiValue>,
}

#[derive(Debug, Deserialize)]
struct WaqiValue {
    v: f64,
}

/// Client for the WAQI city-feed endpoint.
pub struct AirQualityClient {
    client: Client,
    api_key: Option<String>,
    base_url: Url,
    policy: RetryPolicy,
}

impl AirQualityClient {
    /// Creates a client pointed at the production WAQI API.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
        policy: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        Self::with_base_url(api_key, timeout_secs, user_agent, policy, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ProviderError::Api`] if `base_url` is not
    /// a valid URL.
    pub fn with_base_url(
        api_key: Option<String>,
        timeout_secs: u64,
        user_agent: &str,
        policy: RetryPolicy,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let base_url =
            Url::parse(base_url.trim_end_matches('/')).map_err(|e| ProviderError::Api {
                provider: PROVIDER,
                message: format!("invalid base URL '{base_url}': {e}"),
            })?;

        Ok(Self {
            client,
            api_key,
            base_url,
            policy,
        })
    }

    /// Fetches the current air-quality observation for a location, with retry.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::MissingCredentials`] when no API key is configured.
    /// - [`ProviderError::NotFound`] when the provider has no station for the
    ///   location.
    /// - [`ProviderError::Api`] on any other provider-level error envelope.
    /// - [`ProviderError::RateLimited`] / [`ProviderError::UnexpectedStatus`] /
    ///   [`ProviderError::Http`] on HTTP failures after all retries.
    /// - [`ProviderError::Deserialize`] if the body does not match the
    ///   expected shape.
    pub async fn current(&self, location: &str) -> Result<AirQualityObservation, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredentials(PROVIDER))?;
        let url = self.build_url(location, api_key);

        retry::execute(self.policy, || {
            let url = url.clone();
            async move {
                let response = self.client.get(url.clone()).send().await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok());
                    return Err(ProviderError::RateLimited {
                        provider: PROVIDER,
                        retry_after_secs,
                    });
                }

                if !status.is_success() {
                    return Err(ProviderError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.text().await?;
                let raw: serde_json::Value =
                    serde_json::from_str(&body).map_err(|e| ProviderError::Deserialize {
                        context: format!("air-quality({location})"),
                        source: e,
                    })?;

                let envelope: WaqiEnvelope = serde_json::from_value(raw.clone()).map_err(|e| {
                    ProviderError::Deserialize {
                        context: format!("air-quality({location})"),
                        source: e,
                    }
                })?;

                if envelope.status != "ok" {
                    let message = envelope
                        .data
                        .as_str()
                        .unwrap_or("unknown error")
                        .to_string();
                    if message.to_lowercase().contains("unknown station") {
                        return Err(ProviderError::NotFound {
                            provider: PROVIDER,
                            location: location.to_owned(),
                        });
                    }
                    return Err(ProviderError::Api {
                        provider: PROVIDER,
                        message,
                    });
                }

                let data: WaqiData = serde_json::from_value(envelope.data).map_err(|e| {
                    ProviderError::Deserialize {
                        context: format!("air-quality({location}) data"),
                        source: e,
                    }
                })?;

                Ok(AirQualityObservation {
                    aqi: data.aqi,
                    pm25: data.iaqi.pm25.map(|v| v.v),
                    pm10: data.iaqi.pm10.map(|v| v.v),
                    no2: data.iaqi.no2.map(|v| v.v),
                    o3: data.iaqi.o3.map(|v| v.v),
                    raw,
                })
            }
        })
        .await
    }

    /// Builds the `/feed/{city}/` request URL. `Url::path_segments_mut`
    /// percent-encodes the city name.
    fn build_url(&self, location: &str, api_key: &str) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base URL cannot be a base")
            .push("feed")
            .push(location)
            .push("");
        url.query_pairs_mut().append_pair("token", api_key);
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client(base_url: &str) -> AirQualityClient {
        AirQualityClient::with_base_url(
            Some("test-token".to_string()),
            30,
            "surgecast/test",
            RetryPolicy::default(),
            base_url,
        )
        .expect("client construction should not fail")
    }

    #[test]
    fn build_url_constructs_feed_path() {
        let client = test_client("https://api.waqi.info");
        let url = client.build_url("Delhi", "test-token");
        assert_eq!(url.as_str(), "https://api.waqi.info/feed/Delhi/?token=test-token");
    }

    #[test]
    fn build_url_encodes_city_name() {
        let client = test_client("https://api.waqi.info");
        let url = client.build_url("New Delhi", "test-token");
        assert!(
            url.as_str().contains("feed/New%20Delhi/"),
            "city should be percent-encoded: {url}"
        );
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_call() {
        let client = AirQualityClient::with_base_url(
            None,
            30,
            "surgecast/test",
            RetryPolicy::default(),
            "http://127.0.0.1:1",
        )
        .expect("client construction should not fail");
        let err = client.current("Delhi").await.unwrap_err();
        assert!(matches!(err, ProviderError::MissingCredentials("waqi")));
    }
}
