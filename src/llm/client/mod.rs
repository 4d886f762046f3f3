//! LLM client for notice field extraction.
//!
//! Supports the Gemini generateContent API, Ollama for local inference, and
//! OpenAI-compatible chat completion APIs.

mod config;
mod prompts;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use config::{LlmConfig, LlmProvider};
pub use prompts::{field_list, DEFAULT_BATCH_PROMPT, DEFAULT_SINGLE_PROMPT};

use crate::models::RecordErrorKind;
use crate::rate_limit::{backoff_delay, parse_retry_after};

/// Base delay for 429 backoff when the server sends no Retry-After.
const RETRY_BASE_MS: u64 = 1000;

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Failed to connect to LLM service
    #[error("Connection error: {0}")]
    Connection(String),

    /// API returned an error status
    #[error("API error: HTTP {status}: {message}")]
    Api { status: u16, message: String },

    /// Still rate limited after all retries
    #[error("Rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },

    /// No response within the call timeout
    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Failed to decode the provider envelope
    #[error("Parse error: {0}")]
    Parse(String),

    /// Provider answered without any text
    #[error("Empty response from service")]
    EmptyResponse,

    /// Hosted provider configured without a key
    #[error("No API key configured for provider {0}")]
    MissingApiKey(LlmProvider),
}

impl LlmError {
    /// Record annotation kind for a document whose call failed this way.
    pub fn record_kind(&self) -> RecordErrorKind {
        match self {
            LlmError::Timeout(_) => RecordErrorKind::ServiceTimeout,
            LlmError::Parse(_) | LlmError::EmptyResponse => RecordErrorKind::MalformedResponse,
            LlmError::Connection(_)
            | LlmError::Api { .. }
            | LlmError::RateLimited { .. }
            | LlmError::MissingApiKey(_) => RecordErrorKind::ServiceUnavailable,
        }
    }
}

/// Remote service that turns a prompt into free-form text.
#[async_trait]
pub trait FieldExtractionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// LLM client for field extraction.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

/// Gemini generateContent request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

/// Gemini generateContent response format.
#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: String,
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

/// OpenAI chat completion request format.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// OpenAI chat completion response format.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if !config.has_credentials() {
            return Err(LlmError::MissingApiKey(config.provider));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// One-line description of where requests go.
    pub fn describe(&self) -> String {
        format!(
            "{} ({}) at {}",
            self.config.provider,
            self.config.model(),
            self.config.endpoint()
        )
    }

    /// Check if the LLM service is reachable.
    ///
    /// Ollama is probed via `/api/tags`; hosted providers only need a key.
    pub async fn is_available(&self) -> bool {
        match self.config.provider {
            LlmProvider::Ollama => {
                let url = format!("{}/api/tags", self.config.endpoint());
                match self.client.get(&url).send().await {
                    Ok(resp) => resp.status().is_success(),
                    Err(_) => false,
                }
            }
            LlmProvider::Gemini | LlmProvider::OpenAI => self.config.has_credentials(),
        }
    }

    fn api_key(&self) -> &str {
        self.config.api_key.as_deref().unwrap_or_default()
    }

    /// Build the provider-specific request for a prompt.
    fn build_request(&self, prompt: &str) -> RequestBuilder {
        let endpoint = self.config.endpoint();
        let model = self.config.model();

        match self.config.provider {
            LlmProvider::Gemini => {
                let request = GeminiRequest {
                    contents: vec![GeminiContent {
                        parts: vec![GeminiPart { text: prompt }],
                    }],
                    generation_config: GeminiGenerationConfig {
                        temperature: self.config.temperature,
                        max_output_tokens: self.config.max_tokens,
                    },
                };
                let url = format!("{}/v1beta/models/{}:generateContent", endpoint, model);
                self.client
                    .post(&url)
                    .query(&[("key", self.api_key())])
                    .json(&request)
            }
            LlmProvider::Ollama => {
                let request = OllamaRequest {
                    model,
                    prompt,
                    stream: false,
                    options: OllamaOptions {
                        temperature: self.config.temperature,
                        num_predict: self.config.max_tokens,
                    },
                };
                let url = format!("{}/api/generate", endpoint);
                self.client.post(&url).json(&request)
            }
            LlmProvider::OpenAI => {
                let request = ChatRequest {
                    model,
                    messages: vec![ChatMessage {
                        role: "user",
                        content: prompt,
                    }],
                    temperature: self.config.temperature,
                    max_tokens: self.config.max_tokens,
                };
                let url = format!("{}/v1/chat/completions", endpoint);
                self.client
                    .post(&url)
                    .bearer_auth(self.api_key())
                    .json(&request)
            }
        }
    }

    /// Pull the generated text out of a successful response.
    async fn read_text(&self, resp: Response) -> Result<String, LlmError> {
        let text = match self.config.provider {
            LlmProvider::Gemini => {
                let body: GeminiResponse = resp
                    .json()
                    .await
                    .map_err(|e| LlmError::Parse(e.to_string()))?;
                body.candidates
                    .into_iter()
                    .next()
                    .and_then(|c| c.content)
                    .map(|c| {
                        c.parts
                            .into_iter()
                            .map(|p| p.text)
                            .collect::<Vec<_>>()
                            .join("")
                    })
            }
            LlmProvider::Ollama => {
                let body: OllamaResponse = resp
                    .json()
                    .await
                    .map_err(|e| LlmError::Parse(e.to_string()))?;
                Some(body.response)
            }
            LlmProvider::OpenAI => {
                let body: ChatResponse = resp
                    .json()
                    .await
                    .map_err(|e| LlmError::Parse(e.to_string()))?;
                body.choices.into_iter().next().and_then(|c| c.message.content)
            }
        };

        match text {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => Err(LlmError::EmptyResponse),
        }
    }
}

#[async_trait]
impl FieldExtractionService for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let max_attempts = self.config.max_retries + 1;

        for attempt in 0..max_attempts {
            debug!(
                "Sending {} byte prompt to {} (attempt {})",
                prompt.len(),
                self.config.provider,
                attempt + 1
            );

            let resp = self.build_request(prompt).send().await.map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(Duration::from_secs(self.config.timeout_secs))
                } else {
                    LlmError::Connection(e.to_string())
                }
            })?;

            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt + 1 >= max_attempts {
                    break;
                }
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok());
                let wait = parse_retry_after(retry_after)
                    .unwrap_or_else(|| backoff_delay(attempt, RETRY_BASE_MS));
                warn!(
                    "{} rate limited, retrying in {:?}",
                    self.config.provider, wait
                );
                tokio::time::sleep(wait).await;
                continue;
            }

            if !status.is_success() {
                let message = resp.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: message.trim().to_string(),
                });
            }

            return self.read_text(resp).await;
        }

        Err(LlmError::RateLimited {
            attempts: max_attempts,
        })
    }
}
