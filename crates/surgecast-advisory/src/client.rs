//! HTTP client for the OpenAI-compatible chat-completions endpoint used as
//! the reasoning service.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};

use surgecast_providers::{retry, RetryPolicy};

use crate::error::AdvisoryError;
use crate::types::Advisory;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const SYSTEM_PROMPT: &str = "You are a hospital surge-planning assistant. \
Given a JSON feature snapshot (environmental readings, rolling admissions, \
calendar events) and a 0-100 surge risk score, reply with a single JSON \
object and nothing else, using exactly these keys: summary, staffing_plan, \
supply_plan, suggested_actions (array of strings), suggested_medicines \
(array of strings), suggested_diseases (array of objects with name and \
optional severity [low|moderate|high|critical], transmission_rate, \
active_cases, new_cases, affected_groups, medicines, rationale), \
weather_impact, air_quality_impact, confidence (low|medium|high).";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Client for the reasoning service.
pub struct AdvisoryClient {
    client: Client,
    api_key: Option<String>,
    base_url: Url,
    model: String,
    policy: RetryPolicy,
}

impl AdvisoryClient {
    /// Creates a client pointed at the production endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisoryError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        api_key: Option<String>,
        model: &str,
        timeout_secs: u64,
        user_agent: &str,
        policy: RetryPolicy,
    ) -> Result<Self, AdvisoryError> {
        Self::with_base_url(api_key, model, timeout_secs, user_agent, policy, DEFAULT_BASE_URL)
    }

    /// Creates a client with a custom base URL (for testing with wiremock, or
    /// a self-hosted compatible endpoint).
    ///
    /// # Errors
    ///
    /// Returns [`AdvisoryError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`AdvisoryError::InvalidBaseUrl`] if
    /// `base_url` is not a valid URL.
    pub fn with_base_url(
        api_key: Option<String>,
        model: &str,
        timeout_secs: u64,
        user_agent: &str,
        policy: RetryPolicy,
        base_url: &str,
    ) -> Result<Self, AdvisoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| AdvisoryError::InvalidBaseUrl(format!("'{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url,
            model: model.to_owned(),
            policy,
        })
    }

    /// Sends the feature context and score to the reasoning service and
    /// returns the parsed advisory.
    ///
    /// A reply that does not conform to the advisory schema is returned as
    /// [`Advisory::Degraded`], not an error.
    ///
    /// # Errors
    ///
    /// - [`AdvisoryError::MissingCredentials`] when no API key is configured
    ///   (checked before any network call).
    /// - [`AdvisoryError::RateLimited`] / [`AdvisoryError::UnexpectedStatus`] /
    ///   [`AdvisoryError::Http`] on transport failures after all retries.
    /// - [`AdvisoryError::EmptyResponse`] when the service returns no choices.
    pub async fn synthesize(
        &self,
        context: &serde_json::Value,
    ) -> Result<Advisory, AdvisoryError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AdvisoryError::MissingCredentials)?;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .expect("base URL cannot be a base")
            .extend(["v1", "chat", "completions"]);

        let user_content = context.to_string();

        let content = retry::execute(self.policy, || {
            let url = url.clone();
            let user_content = user_content.clone();
            async move {
                let request = ChatRequest {
                    model: &self.model,
                    temperature: 0.2,
                    messages: [
                        ChatMessage {
                            role: "system",
                            content: SYSTEM_PROMPT,
                        },
                        ChatMessage {
                            role: "user",
                            content: &user_content,
                        },
                    ],
                };

                let response = self
                    .client
                    .post(url.clone())
                    .bearer_auth(api_key)
                    .json(&request)
                    .send()
                    .await?;
                let status = response.status();

                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok());
                    return Err(AdvisoryError::RateLimited { retry_after_secs });
                }

                if !status.is_success() {
                    return Err(AdvisoryError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }

                let body = response.text().await?;
                let parsed: ChatResponse =
                    serde_json::from_str(&body).map_err(|e| AdvisoryError::Deserialize {
                        context: "chat completion envelope".to_string(),
                        source: e,
                    })?;

                parsed
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or(AdvisoryError::EmptyResponse)
            }
        })
        .await?;

        let advisory = Advisory::parse(&content);
        if matches!(advisory, Advisory::Degraded { .. }) {
            tracing::warn!(
                reply_len = content.len(),
                "reasoning service reply did not match the advisory schema; degrading"
            );
        }
        Ok(advisory)
    }
}
