use crate::types::{GenerateContentRequest, GenerateContentResponse};
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

pub const BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// A client for the Gemini `generateContent` REST endpoint.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model)
    }

    /// Sends one request and returns the parsed response. Non-2xx statuses are errors.
    pub async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        tracing::debug!("Sending generateContent request to {}", model);

        let response = self
            .http
            .post(self.endpoint(model))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .with_context(|| format!("Failed to reach Gemini model {model}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Gemini model {model} returned {status}: {body}"
            ));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .context("Failed to deserialize Gemini response")
    }
}
