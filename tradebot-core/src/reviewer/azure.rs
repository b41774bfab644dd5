//! Azure OpenAI completions client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ReviewError, TextCompleter};
use crate::config::ReviewerConfig;

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    text: String,
}

pub struct AzureCompleter {
    client: reqwest::blocking::Client,
    url: String,
    api_key: String,
    max_tokens: u32,
    temperature: f64,
}

impl AzureCompleter {
    pub fn new(config: &ReviewerConfig, api_key: impl Into<String>) -> Result<Self, ReviewError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReviewError::Call(format!("failed to build HTTP client: {e}")))?;
        let url = format!(
            "{}/openai/deployments/{}/completions?api-version={}",
            config.endpoint.trim_end_matches('/'),
            config.deployment,
            config.api_version
        );
        Ok(Self {
            client,
            url,
            api_key: api_key.into(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    /// Key from `AZURE_OPENAI_API_KEY`.
    pub fn from_env(config: &ReviewerConfig) -> Result<Self, ReviewError> {
        let key = std::env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| ReviewError::Call("AZURE_OPENAI_API_KEY is not set".into()))?;
        Self::new(config, key)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TextCompleter for AzureCompleter {
    fn name(&self) -> &str {
        "azure_openai"
    }

    fn complete(&self, prompt: &str) -> Result<String, ReviewError> {
        let response = self
            .client
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&CompletionRequest {
                prompt,
                max_tokens: self.max_tokens,
                temperature: self.temperature,
            })
            .send()
            .map_err(|e| ReviewError::Call(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ReviewError::Call(format!("HTTP {status}: {body}")));
        }

        let body: CompletionResponse = response
            .json()
            .map_err(|e| ReviewError::Call(format!("unexpected response: {e}")))?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(ReviewError::EmptyResponse)
    }
}
