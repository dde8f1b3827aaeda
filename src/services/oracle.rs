use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::services::prompts::{build_correction_prompt, build_fit_prompt};

/// Errors from a correction oracle call.
///
/// The orchestrator never propagates these: a failed fit check counts as
/// "does not fit" and a failed correction returns the input unchanged.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(String),

    #[error("oracle request timed out")]
    Timeout,

    #[error("failed to parse oracle response: {0}")]
    Parse(String),

    #[error("oracle returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for OracleError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OracleError::Timeout
        } else {
            OracleError::Request(e.to_string())
        }
    }
}

/// Text-correction oracle consumed by the repair orchestrator.
///
/// Both calls are idempotent from the caller's perspective and carry a
/// bounded timeout so a stuck backend cannot stall the run.
#[async_trait]
pub trait CorrectionOracle: Send + Sync {
    /// Does `text` plausibly fit the surrounding `context`?
    async fn ask_fits(&self, text: &str, context: &str, roster_hint: &str)
    -> Result<bool, OracleError>;

    /// Return a corrected version of `text` under the constraint set
    async fn correct(&self, text: &str, context: &str, roster_hint: &str)
    -> Result<String, OracleError>;
}

/// Configuration for the Ollama correction oracle
#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Model name, e.g. "mistral-nemo:12b-instruct-2407-fp16"
    pub model: String,
    /// Base API URL, e.g. "http://localhost:11434"
    pub api_url: String,
    /// Sampling temperature (low = more deterministic)
    pub temperature: f64,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            model: "mistral-nemo:12b-instruct-2407-fp16".to_string(),
            api_url: "http://localhost:11434".to_string(),
            temperature: 0.1,
            timeout_secs: 30,
        }
    }
}

impl OracleConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: std::env::var("OLLAMA_MODEL").unwrap_or(defaults.model),
            api_url: std::env::var("OLLAMA_API_URL").unwrap_or(defaults.api_url),
            temperature: std::env::var("OLLAMA_TEMPERATURE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.temperature),
            timeout_secs: defaults.timeout_secs,
        }
    }
}

/// Ollama-backed correction oracle
pub struct OllamaOracle {
    client: Client,
    config: OracleConfig,
}

impl OllamaOracle {
    pub fn new(config: OracleConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }

    /// Send a prompt to the Ollama generate endpoint and return the raw text
    async fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            temperature: self.config.temperature,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.config.api_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Request(format!("{} - {}", status, body)));
        }

        let response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        let text = response.response.trim().to_string();
        if text.is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl CorrectionOracle for OllamaOracle {
    async fn ask_fits(
        &self,
        text: &str,
        context: &str,
        roster_hint: &str,
    ) -> Result<bool, OracleError> {
        let prompt = build_fit_prompt(text, context, roster_hint);
        let answer = self.generate(&prompt).await?;
        debug!("Fit check answered: {:.20}", answer);

        let lowered = answer.to_lowercase();
        if lowered.starts_with("yes") {
            Ok(true)
        } else if lowered.starts_with("no") {
            Ok(false)
        } else {
            Err(OracleError::Parse(format!(
                "expected yes/no, got: {:.40}",
                answer
            )))
        }
    }

    async fn correct(
        &self,
        text: &str,
        context: &str,
        roster_hint: &str,
    ) -> Result<String, OracleError> {
        let prompt = build_correction_prompt(text, context, roster_hint);
        self.generate(&prompt).await
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    temperature: f64,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}
