//! HTTP client for the OpenWeather current-conditions API.
//!
//! Maps a location name to one `GET /weather` request, classifies failures
//! for the retry executor, and normalizes the response into the reading
//! store's schema. The full response body is kept as the audit snapshot.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;

use crate::error::ProviderError;
use crate::retry::{self, RetryPolicy};

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

/// Source tag written to readings fetched from this provider.
pub const WEATHER_SOURCE: &str = "openweather";

const PROVIDER: &str = "openweather";

/// A normalized weather observation for one location.
#[derive(Debug, Clone)]
pub struct WeatherObservation {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub precipitation_mm: f64,
    pub wind_speed_ms: Option<f64>,
    pub condition: Option<String>,
    /// Raw provider payload, persisted for audit.
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OwmResponse {
    main: OwmMain,
    #[serde(default)]
    rain: Option<OwmRain>,
    #[serde(default)]
    wind: Option<OwmWind>,
    #[serde(default)]
    weather: Vec<OwmCondition>,
}

#[derive(Debug, Deserialize)]
struct OwmMain {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwmRain {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmWind {
    #[serde(default)]
    speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct OwmCondition {
    main: String,
}

/// Client for the OpenWeather current-conditions endpoint.
pub struct WeatherClient {
    client: Client,
    api_key: Option<String>,
    base_url: Url,
    policy: RetryPolicy,
}

impl WeatherClient {
    /// Creates a client pointed at the production OpenWeather API.
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

    /// Creates a client with a custom base URL (for testing with wiremock, or
    /// a configured proxy).
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

        // Normalise: a trailing slash would produce a double slash when the
        // endpoint path is appended.
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

    /// Fetches the current weather observation for a location, with retry.
    ///
    /// # Errors
    ///
    /// - [`ProviderError::MissingCredentials`] when no API key is configured
    ///   (checked before any network call).
    /// - [`ProviderError::RateLimited`] — HTTP 429 after all retries.
    /// - [`ProviderError::NotFound`] — the provider knows no such location.
    /// - [`ProviderError::UnexpectedStatus`] / [`ProviderError::Http`] on
    ///   other HTTP failures after all retries.
    /// - [`ProviderError::Deserialize`] if the body does not match the
    ///   expected shape.
    pub async fn current(&self, location: &str) -> Result<WeatherObservation, ProviderError> {
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

                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(ProviderError::NotFound {
                        provider: PROVIDER,
                        location: location.to_owned(),
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
                        context: format!("weather({location})"),
                        source: e,
                    })?;

                let parsed: OwmResponse = serde_json::from_value(raw.clone()).map_err(|e| {
                    ProviderError::Deserialize {
                        context: format!("weather({location})"),
                        source: e,
                    }
                })?;

                Ok(WeatherObservation {
                    temperature_c: parsed.main.temp,
                    humidity_pct: parsed.main.humidity,
                    precipitation_mm: parsed
                        .rain
                        .and_then(|r| r.one_hour)
                        .unwrap_or(0.0),
                    wind_speed_ms: parsed.wind.and_then(|w| w.speed),
                    condition: parsed.weather.into_iter().next().map(|c| c.main),
                    raw,
                })
            }
        })
        .await
    }

    /// Builds the `/weather` request URL with percent-encoded parameters.
    fn build_url(&self, location: &str, api_key: &str) -> Url {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base URL cannot be a base")
            .push("weather");
        url.query_pairs_mut()
            .append_pair("q", location)
            .append_pair("units", "metric")
            .append_pair("appid", api_key);
        url
    }
}
