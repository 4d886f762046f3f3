//! Configuration management for litigation-tracker.
//!
//! Configuration comes from an optional file (TOML, YAML or JSON, chosen by
//! extension) with environment variable overrides applied on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::{LlmConfig, LlmProvider};
use crate::ocr::OcrConfig;
use crate::schema::{FieldSchema, SchemaDefinition, SchemaError, SchemaRegistry, DEFAULT_SCHEMA_VERSION};
use crate::services::StrategyKind;

/// Name `prefer` discovers config files under.
pub const CONFIG_BASENAME: &str = "litigation-tracker";

/// Configuration problems. Always fatal, and always detected before any
/// document is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {format} config {}: {message}", path.display())]
    Parse {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(
        "No API key configured for provider {0}. Set LLM_API_KEY or the provider key (GEMINI_API_KEY, OPENAI_API_KEY, GROQ_API_KEY)"
    )]
    MissingApiKey(LlmProvider),

    #[error("Worker count must be at least 1")]
    InvalidWorkers,

    #[error("Maximum batch size must be at least 1")]
    InvalidBatchSize,
}

/// Run-level pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Field extraction strategy (single or batched)
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Schema version for output records
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Concurrent worker slots
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Split batched runs into calls of at most this many documents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_batch_size: Option<usize>,
}

fn default_schema_version() -> String {
    DEFAULT_SCHEMA_VERSION.to_string()
}

fn default_workers() -> usize {
    1
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            schema_version: default_schema_version(),
            workers: default_workers(),
            max_batch_size: None,
        }
    }
}

impl PipelineConfig {
    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `PIPELINE_STRATEGY`: "single" or "batched"
    /// - `PIPELINE_SCHEMA_VERSION`: Schema version identifier
    /// - `PIPELINE_WORKERS`: Worker slot count
    /// - `PIPELINE_MAX_BATCH_SIZE`: Documents per batched call
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("PIPELINE_STRATEGY") {
            if let Some(strategy) = StrategyKind::from_str(&val) {
                self.strategy = strategy;
            }
        }
        if let Ok(val) = std::env::var("PIPELINE_SCHEMA_VERSION") {
            self.schema_version = val;
        }
        if let Ok(val) = std::env::var("PIPELINE_WORKERS") {
            if let Ok(n) = val.parse() {
                self.workers = n;
            }
        }
        if let Ok(val) = std::env::var("PIPELINE_MAX_BATCH_SIZE") {
            if let Ok(n) = val.parse() {
                self.max_batch_size = Some(n);
            }
        }
        self
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Field extraction service settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Text extraction settings.
    #[serde(default)]
    pub ocr: OcrConfig,
    /// Run settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Custom schemas by version.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, SchemaDefinition>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load from an explicit path, or from the first discovered config file,
    /// or defaults. Environment overrides are applied in every case.
    pub async fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit_path {
            Some(path) => Some(expand_path(path)),
            None => Self::discover().await,
        };

        let config = match path {
            Some(path) => {
                tracing::debug!("Loading config from {}", path.display());
                Self::load_from_path(&path).await?
            }
            None => Self::default(),
        };

        Ok(config.with_env_overrides())
    }

    /// Config file discovered by `prefer` in its standard locations.
    pub async fn discover() -> Option<PathBuf> {
        match prefer::load(CONFIG_BASENAME).await {
            Ok(found) => found.source_path().map(|path| path.to_path_buf()),
            Err(e) => {
                tracing::debug!("No config file discovered: {}", e);
                None
            }
        }
    }

    /// Load configuration from a specific file path.
    /// Supports TOML, YAML and JSON based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse file contents, picking the format from the path's extension.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let parse_error = |format: &'static str, message: String| ConfigError::Parse {
            format,
            path: path.to_path_buf(),
            message,
        };

        match ext {
            "toml" => toml::from_str(contents).map_err(|e| parse_error("TOML", e.to_string())),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| parse_error("YAML", e.to_string()))
            }
            _ => serde_json::from_str(contents).map_err(|e| parse_error("JSON", e.to_string())),
        }
    }

    /// Apply environment variable overrides to every section.
    pub fn with_env_overrides(mut self) -> Self {
        self.llm = self.llm.with_env_overrides();
        self.ocr = self.ocr.with_env_overrides();
        self.pipeline = self.pipeline.with_env_overrides();
        self
    }

    /// Built-in schemas plus any configured ones.
    pub fn schema_registry(&self) -> Result<SchemaRegistry, ConfigError> {
        Ok(SchemaRegistry::with_custom(&self.schemas)?)
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub schema: Arc<FieldSchema>,
    pub strategy: StrategyKind,
    pub workers: usize,
    pub max_batch_size: Option<usize>,
}

impl RunConfig {
    /// Resolve the schema and check settings and credentials.
    pub fn validate(config: &Config) -> Result<Self, ConfigError> {
        let pipeline = &config.pipeline;
        if pipeline.workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        if pipeline.max_batch_size == Some(0) {
            return Err(ConfigError::InvalidBatchSize);
        }

        let schema = config
            .schema_registry()?
            .resolve(&pipeline.schema_version)?;

        if !config.llm.has_credentials() {
            return Err(ConfigError::MissingApiKey(config.llm.provider));
        }

        Ok(Self {
            schema,
            strategy: pipeline.strategy,
            workers: pipeline.workers,
            max_batch_size: pipeline.max_batch_size,
        })
    }
}

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(path_str.as_ref()).as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_with_key() -> Config {
        let mut config = Config::default();
        config.llm.api_key = Some("test-key".to_string());
        config
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::parse(
            r#"
            [llm]
            provider = "ollama"

            [pipeline]
            strategy = "batched"
            schema_version = "firm-v2"
            workers = 4

            [schemas.firm-v2]
            fields = ["Client", "GSTIN", "Hearing Date"]
            "#,
            Path::new("litigation-tracker.toml"),
        )
        .unwrap();

        assert_eq!(config.llm.provider, LlmProvider::Ollama);
        assert_eq!(config.pipeline.strategy, StrategyKind::Batched);
        assert_eq!(config.pipeline.workers, 4);

        let run = RunConfig::validate(&config).unwrap();
        assert_eq!(run.schema.version(), "firm-v2");
        assert_eq!(run.schema.fields(), ["Client", "GSTIN", "Hearing Date"]);
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = Config::parse(
            "pipeline:\n  strategy: single\n  workers: 2\n",
            Path::new("config.yaml"),
        )
        .unwrap();
        assert_eq!(yaml.pipeline.workers, 2);

        let json = Config::parse(
            r#"{"ocr": {"language": "eng+hin"}}"#,
            Path::new("config.json"),
        )
        .unwrap();
        assert_eq!(json.ocr.language, "eng+hin");
        assert_eq!(json.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_parse_error_names_format() {
        let err = Config::parse("[pipeline\n", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format: "TOML", .. }));
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("litigation-tracker.toml");
        std::fs::write(&path, "[pipeline]\nworkers = 3\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.pipeline.workers, 3);
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
    }

    #[tokio::test]
    async fn test_load_uses_explicit_path_over_discovery() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "pipeline:\n  max_batch_size: 4\n").unwrap();

        let config = Config::load(Some(&path)).await.unwrap();
        assert_eq!(config.source_path.as_deref(), Some(path.as_path()));
        assert_eq!(config.pipeline.max_batch_size, Some(4));
    }

    #[tokio::test]
    async fn test_missing_file_is_read_error() {
        let err = Config::load_from_path(Path::new("/nonexistent/litigation-tracker.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_validate_rejects_unknown_schema() {
        let mut config = config_with_key();
        config.pipeline.schema_version = "gst-litigation-v9".to_string();
        assert!(matches!(
            RunConfig::validate(&config),
            Err(ConfigError::Schema(SchemaError::UnknownVersion(_)))
        ));
    }

    #[test]
    fn test_validate_rejects_missing_credentials() {
        let config = Config::default();
        assert!(matches!(
            RunConfig::validate(&config),
            Err(ConfigError::MissingApiKey(LlmProvider::Gemini))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = config_with_key();
        config.pipeline.workers = 0;
        assert!(matches!(
            RunConfig::validate(&config),
            Err(ConfigError::InvalidWorkers)
        ));
    }

    #[test]
    fn test_validate_defaults() {
        let run = RunConfig::validate(&config_with_key()).unwrap();
        assert_eq!(run.schema.version(), DEFAULT_SCHEMA_VERSION);
        assert_eq!(run.strategy, StrategyKind::Single);
        assert_eq!(run.workers, 1);
        assert_eq!(run.max_batch_size, None);
    }

    #[test]
    fn test_expand_path_leaves_plain_paths() {
        assert_eq!(expand_path(Path::new("out/a.csv")), PathBuf::from("out/a.csv"));
    }
}
