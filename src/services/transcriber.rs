use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Errors from the re-transcription service.
///
/// Any of these makes retranscription unavailable for the affected segment
/// only; the orchestrator falls through to LLM correction.
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("invalid time range: {start} to {end}")]
    InvalidSpan { start: f64, end: f64 },

    #[error("transcription request failed: {0}")]
    Request(String),

    #[error("transcription request timed out")]
    Timeout,

    #[error("failed to parse transcription response: {0}")]
    Parse(String),

    #[error("transcription returned no segments")]
    Empty,
}

impl From<reqwest::Error> for TranscribeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TranscribeError::Timeout
        } else {
            TranscribeError::Request(e.to_string())
        }
    }
}

/// Re-transcription of one audio span
#[derive(Debug, Clone)]
pub struct SpanTranscription {
    /// Joined text of all returned segments
    pub text: String,
    /// Lowest confidence among returned segments, if any reported one
    pub confidence: Option<f64>,
}

/// Narrow-span speech-to-text collaborator.
///
/// A second decoding pass over `[start, end]` with more conservative
/// parameters than the first; implementations block until completion or a
/// bounded timeout.
#[async_trait]
pub trait SpanTranscriber: Send + Sync {
    async fn transcribe_span(
        &self,
        audio_ref: &str,
        start: f64,
        end: f64,
    ) -> Result<SpanTranscription, TranscribeError>;
}

/// Configuration for the transcription service client
#[derive(Debug, Clone)]
pub struct TranscriberConfig {
    /// Base URL of the transcription service
    pub base_url: String,
    /// Per-request timeout in seconds; retranscription decodes audio, so
    /// this is longer than the oracle timeout
    pub timeout_secs: u64,
    /// Decode batch size; smaller than the first pass for better accuracy
    pub batch_size: u32,
    /// Internal chunk length in seconds; shorter keeps the decoder focused
    pub chunk_length_s: u32,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9090".to_string(),
            timeout_secs: 60,
            batch_size: 8,
            chunk_length_s: 15,
        }
    }
}

impl TranscriberConfig {
    /// Create config from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("TRANSCRIBER_URL").unwrap_or(defaults.base_url),
            ..defaults
        }
    }
}

/// HTTP client for the re-transcription service
pub struct HttpTranscriber {
    client: Client,
    config: TranscriberConfig,
}

impl HttpTranscriber {
    pub fn new(config: TranscriberConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, config }
    }
}

#[async_trait]
impl SpanTranscriber for HttpTranscriber {
    async fn transcribe_span(
        &self,
        audio_ref: &str,
        start: f64,
        end: f64,
    ) -> Result<SpanTranscription, TranscribeError> {
        if start < 0.0 || start >= end {
            return Err(TranscribeError::InvalidSpan { start, end });
        }

        debug!("Retranscribing span {:.1}s-{:.1}s", start, end);

        let request = SpanRequest {
            audio: audio_ref.to_string(),
            start,
            end,
            batch_size: self.config.batch_size,
            chunk_length_s: self.config.chunk_length_s,
        };

        let response = self
            .client
            .post(format!("{}/retranscribe", self.config.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TranscribeError::Request(format!("{} - {}", status, body)));
        }

        let response: SpanResponse = response
            .json()
            .await
            .map_err(|e| TranscribeError::Parse(e.to_string()))?;

        span_from_segments(response.segments)
    }
}

/// Collapse the returned segment list into one span transcription
fn span_from_segments(segments: Vec<SpanSegment>) -> Result<SpanTranscription, TranscribeError> {
    let text = segments
        .iter()
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        return Err(TranscribeError::Empty);
    }

    // The weakest segment bounds how much we trust the whole span
    let confidence = segments
        .iter()
        .filter_map(|s| s.confidence)
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    Ok(SpanTranscription { text, confidence })
}

#[derive(Debug, Serialize)]
struct SpanRequest {
    audio: String,
    start: f64,
    end: f64,
    batch_size: u32,
    chunk_length_s: u32,
}

#[derive(Debug, Deserialize)]
struct SpanResponse {
    #[serde(default)]
    segments: Vec<SpanSegment>,
}

#[derive(Debug, Deserialize)]
struct SpanSegment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    confidence: Option<f64>,
}
