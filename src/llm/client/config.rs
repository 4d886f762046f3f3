//! LLM client configuration.

use serde::{Deserialize, Serialize};

use super::prompts::{DEFAULT_BATCH_PROMPT, DEFAULT_SINGLE_PROMPT};

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const OLLAMA_ENDPOINT: &str = "http://localhost:11434";
const OPENAI_ENDPOINT: &str = "https://api.openai.com";
const GROQ_ENDPOINT: &str = "https://api.groq.com/openai";
const TOGETHER_ENDPOINT: &str = "https://api.together.xyz";

/// LLM provider type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Google Gemini generateContent API (default)
    #[default]
    Gemini,
    /// Ollama API (local)
    Ollama,
    /// OpenAI-compatible API (OpenAI, Groq, Together.ai, etc.)
    OpenAI,
}

impl LlmProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "ollama" => Some(Self::Ollama),
            "openai" | "groq" | "together" => Some(Self::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
        }
    }

    /// Endpoint used when none is configured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_ENDPOINT,
            Self::Ollama => OLLAMA_ENDPOINT,
            Self::OpenAI => OPENAI_ENDPOINT,
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::Ollama => "llama3.1:8b",
            Self::OpenAI => "gpt-4o-mini",
        }
    }

    /// Whether requests must carry an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for the field extraction service client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// LLM provider (gemini, ollama or openai)
    #[serde(default)]
    pub provider: LlmProvider,
    /// API endpoint (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// API key for hosted providers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model to use (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Maximum tokens in response (provider default when unset)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Seconds to wait for one service call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after an HTTP 429 before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Maximum bytes of document text embedded in a prompt
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Custom single-document prompt (uses {fields} and {content} placeholders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_prompt: Option<String>,
    /// Custom batch prompt (uses {fields} and {documents} placeholders)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_prompt: Option<String>,
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_content_chars() -> usize {
    30000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            endpoint: None,
            api_key: None,
            model: None,
            max_tokens: None,
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_content_chars: default_max_content_chars(),
            single_prompt: None,
            batch_prompt: None,
        }
    }
}

impl LlmConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `LLM_PROVIDER`: "gemini" (default), "ollama", "openai", "groq", or "together"
    /// - `LLM_ENDPOINT`: API endpoint (defaults based on provider)
    /// - `LLM_API_KEY`: API key for any hosted provider
    /// - `GEMINI_API_KEY` / `OPENAI_API_KEY` / `GROQ_API_KEY`: provider keys
    /// - `LLM_MODEL`: Model name
    /// - `LLM_TIMEOUT_SECS`: Per-call timeout
    /// - `LLM_MAX_CONTENT_CHARS`: Max document bytes to send
    ///
    /// An explicit `LLM_PROVIDER` is authoritative. Without it, a Gemini
    /// config with no `GEMINI_API_KEY` switches to an OpenAI-compatible
    /// provider if `GROQ_API_KEY` or `OPENAI_API_KEY` is set.
    pub fn with_env_overrides(mut self) -> Self {
        let explicit_provider = std::env::var("LLM_PROVIDER").ok();
        if let Some(ref val) = explicit_provider {
            if let Some(provider) = LlmProvider::from_str(val) {
                self.provider = provider;
            }
        }

        let explicit_endpoint = std::env::var("LLM_ENDPOINT").ok();
        if let Some(ref endpoint) = explicit_endpoint {
            self.endpoint = Some(endpoint.clone());
        }

        if let Ok(val) = std::env::var("LLM_API_KEY") {
            self.api_key = Some(val);
        }

        if let Some(ref provider_str) = explicit_provider {
            let provider_lower = provider_str.to_lowercase();

            if explicit_endpoint.is_none() {
                match provider_lower.as_str() {
                    "groq" => self.endpoint = Some(GROQ_ENDPOINT.to_string()),
                    "together" => self.endpoint = Some(TOGETHER_ENDPOINT.to_string()),
                    _ => {}
                }
            }

            if self.api_key.is_none() {
                self.api_key = match provider_lower.as_str() {
                    "gemini" | "google" => std::env::var("GEMINI_API_KEY").ok(),
                    "groq" => std::env::var("GROQ_API_KEY").ok(),
                    "openai" => std::env::var("OPENAI_API_KEY").ok(),
                    _ => None,
                };
            }
        } else if self.api_key.is_none() {
            match self.provider {
                LlmProvider::Gemini => {
                    if let Ok(key) = std::env::var("GEMINI_API_KEY") {
                        self.api_key = Some(key);
                    } else if let Ok(key) = std::env::var("GROQ_API_KEY") {
                        self.api_key = Some(key);
                        self.provider = LlmProvider::OpenAI;
                        if explicit_endpoint.is_none() && self.endpoint.is_none() {
                            self.endpoint = Some(GROQ_ENDPOINT.to_string());
                        }
                    } else if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                        self.api_key = Some(key);
                        self.provider = LlmProvider::OpenAI;
                    }
                }
                LlmProvider::OpenAI => {
                    self.api_key = std::env::var("OPENAI_API_KEY")
                        .or_else(|_| std::env::var("GROQ_API_KEY"))
                        .ok();
                }
                LlmProvider::Ollama => {}
            }
        }

        if let Ok(val) = std::env::var("LLM_MODEL") {
            self.model = Some(val);
        }
        if let Ok(val) = std::env::var("LLM_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.timeout_secs = n;
            }
        }
        if let Ok(val) = std::env::var("LLM_MAX_CONTENT_CHARS") {
            if let Ok(n) = val.parse() {
                self.max_content_chars = n;
            }
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Configured endpoint without a trailing slash, or the provider default.
    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
            .trim_end_matches('/')
    }

    /// Configured model, or the provider default.
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Whether the configured provider has the credentials it needs.
    pub fn has_credentials(&self) -> bool {
        !self.provider.requires_api_key()
            || self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Get the single-document prompt, using custom or default.
    pub fn get_single_prompt(&self) -> &str {
        self.single_prompt.as_deref().unwrap_or(DEFAULT_SINGLE_PROMPT)
    }

    /// Get the batch prompt, using custom or default.
    pub fn get_batch_prompt(&self) -> &str {
        self.batch_prompt.as_deref().unwrap_or(DEFAULT_BATCH_PROMPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_provider() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, LlmProvider::Gemini);
        assert_eq!(config.model(), "gemini-2.5-flash");
        assert_eq!(config.endpoint(), GEMINI_ENDPOINT);
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.max_retries, 3);
        assert!(config.get_single_prompt().contains("{content}"));
        assert!(config.get_batch_prompt().contains("{documents}"));

        let ollama = LlmConfig {
            provider: LlmProvider::Ollama,
            ..LlmConfig::default()
        };
        assert_eq!(ollama.endpoint(), OLLAMA_ENDPOINT);
        assert!(ollama.has_credentials());
    }

    #[test]
    fn test_explicit_values_win_over_provider_defaults() {
        let config = LlmConfig::default()
            .with_endpoint("http://proxy.internal:8080/")
            .with_model("gemini-2.0-pro");
        assert_eq!(config.endpoint(), "http://proxy.internal:8080");
        assert_eq!(config.model(), "gemini-2.0-pro");
    }

    #[test]
    fn test_credentials_required_for_hosted_providers() {
        let mut config = LlmConfig::default();
        assert!(!config.has_credentials());
        config.api_key = Some("   ".to_string());
        assert!(!config.has_credentials());
        config.api_key = Some("AIza-test".to_string());
        assert!(config.has_credentials());
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!(LlmProvider::from_str("GROQ"), Some(LlmProvider::OpenAI));
        assert_eq!(LlmProvider::from_str("google"), Some(LlmProvider::Gemini));
        assert_eq!(LlmProvider::from_str("anthropic"), None);
    }

    #[test]
    fn test_deserialize_partial_section() {
        let config: LlmConfig = toml::from_str(
            r#"
            provider = "ollama"
            model = "qwen2.5:14b"
            timeout_secs = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.provider, LlmProvider::Ollama);
        assert_eq!(config.model(), "qwen2.5:14b");
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(config.max_content_chars, 30000);
    }
}
