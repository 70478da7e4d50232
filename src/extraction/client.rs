//! Gemini REST client.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, info};

use super::api_types::{ApiErrorResponse, GenerateContentRequest, GenerateContentResponse, GenerationConfig};
use super::{build_prompt, parsing::parse_activities, ActivityExtractor};
use crate::errors::ExtractionError;
use crate::models::ExtractedActivity;
use crate::retry::{retry_with_backoff, RetryPolicy};

pub const DEFAULT_API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for [`GeminiClient`]
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub api_url: String,
    pub generation: GenerationConfig,
    pub retry: RetryPolicy,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            generation: GenerationConfig::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the client at another endpoint (used by tests)
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Extraction client backed by the Gemini `generateContent` endpoint
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, ExtractionError> {
        if config.api_key.trim().is_empty() {
            return Err(ExtractionError::Configuration("API key is empty".to_string()));
        }

        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ExtractionError::Configuration(e.to_string()))?;

        info!(model = %config.model, temperature = config.generation.temperature, "Gemini client initialised");

        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }

    /// One model invocation. Returns the raw response text.
    pub async fn generate(&self, prompt: &str) -> Result<String, ExtractionError> {
        let body = GenerateContentRequest::single_prompt(prompt, self.config.generation.clone());

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorResponse>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            error!(status = status.as_u16(), error = %message, "Gemini API call failed");
            return Err(ExtractionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateContentResponse = response.json().await?;
        let text = parsed.text().ok_or(ExtractionError::EmptyResponse)?;
        debug!(preview = %text.chars().take(500).collect::<String>(), "Gemini raw response");
        Ok(text)
    }
}

#[async_trait]
impl ActivityExtractor for GeminiClient {
    async fn extract(&self, text: &str) -> Result<Vec<ExtractedActivity>, ExtractionError> {
        let prompt = build_prompt(text);
        info!(chars = text.chars().count(), "Sending text to Gemini");

        // Malformed or out-of-schema output is retried like a failed call
        let activities = retry_with_backoff(
            &self.config.retry,
            "gemini_extract",
            ExtractionError::is_transient,
            || async {
                let raw = self.generate(&prompt).await?;
                parse_activities(&raw).inspect_err(|e| {
                    error!(error = %e, preview = %raw.chars().take(300).collect::<String>(), "Gemini output rejected");
                })
            },
        )
        .await?;

        info!(count = activities.len(), "Gemini returned activities");
        Ok(activities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_key_is_rejected() {
        let result = GeminiClient::new(GeminiConfig::new("  "));
        assert!(matches!(result, Err(ExtractionError::Configuration(_))));
    }

    #[test]
    fn test_endpoint_format() {
        let client = GeminiClient::new(
            GeminiConfig::new("key").with_api_url("http://localhost:9000/"),
        )
        .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }
}
