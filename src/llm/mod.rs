//! Generative-language provider seam.
//!
//! [`LanguageModel`] is what the assistant delegates to. [`GeminiClient`] is
//! the production implementation: a single-turn `generateContent` call over
//! HTTP with the API key held in a [`SecretString`].
//!
//! Every way the call can go wrong is a [`DelegationError`]. The assistant
//! treats all of them the same and falls back.
//!
//! [`SecretString`]: secrecy::SecretString

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::GeminiConfig;
use crate::config::secrets::{ExposeSecret, SecretString};
use crate::error::{Error, Result};

/// Fixed system preamble prepended to every delegated prompt.
pub const SYSTEM_PREAMBLE: &str = "You are a helpful assistant specializing in field data \
collection and analysis. You help field personnel with environmental measurements, \
agricultural observations, sensor readings, and data collection best practices. \
Give concise, practical answers.";

/// Longest error body kept on a [`DelegationError::Status`], in characters.
pub const ERROR_BODY_CHARS: usize = 512;

/// Build the single-turn prompt: preamble, then the user's message verbatim.
pub fn build_prompt(message: &str) -> String {
    format!("{SYSTEM_PREAMBLE}\n\nUser question: {message}")
}

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 500,
            temperature: 0.7,
        }
    }
}

/// A successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

#[derive(Debug, Error)]
pub enum DelegationError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Something that can turn a prompt into text.
pub trait LanguageModel: Send + Sync {
    /// Model identifier, reported on GenAI spans.
    fn model_name(&self) -> &str;

    /// Provider identifier, reported on GenAI spans.
    fn provider(&self) -> &str;

    /// Request parameters sent with every generation.
    fn generation(&self) -> GenerationConfig {
        GenerationConfig::default()
    }

    fn generate(
        &self,
        prompt: &str,
    ) -> impl Future<Output = std::result::Result<Completion, DelegationError>> + Send;
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// Client for the Gemini `generateContent` endpoint.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    generation: GenerationConfig,
}

impl GeminiClient {
    /// Create a client against `base_url` (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    ///
    /// # Errors
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            generation: GenerationConfig::default(),
        })
    }

    /// Build a client if an API key is configured; `None` otherwise.
    pub fn from_config(config: &GeminiConfig) -> Result<Option<Self>> {
        config
            .api_key
            .clone()
            .map(|key| Self::new(key, &config.model, &config.base_url, config.timeout))
            .transpose()
    }

    /// Override the request parameters.
    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

impl LanguageModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn provider(&self) -> &str {
        "gemini"
    }

    fn generation(&self) -> GenerationConfig {
        self.generation
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<Completion, DelegationError> {
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: WireGenerationConfig {
                max_output_tokens: self.generation.max_output_tokens,
                temperature: self.generation.temperature,
            },
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DelegationError::Status {
                status: status.as_u16(),
                body: clip_body(&body),
            });
        }

        let payload: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DelegationError::Malformed(e.to_string()))?;
        extract_completion(payload)
    }
}

/// First [`ERROR_BODY_CHARS`] characters of an error body.
fn clip_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_CHARS).collect()
}

/// Pull the first candidate's text out of a response body.
fn extract_completion(
    payload: GenerateResponse,
) -> std::result::Result<Completion, DelegationError> {
    let text = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().find_map(|p| p.text))
        .ok_or_else(|| DelegationError::Malformed("no candidate text".to_string()))?;

    if text.trim().is_empty() {
        return Err(DelegationError::Malformed("empty candidate text".to_string()));
    }

    let usage = payload.usage_metadata.unwrap_or_default();
    Ok(Completion {
        text,
        input_tokens: usage.prompt_token_count,
        output_tokens: usage.candidates_token_count,
    })
}

// Wire types for generateContent.

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: WireGenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u64>,
    candidates_token_count: Option<u64>,
}
