//! OCR backend abstraction.
//!
//! The extractor only needs "give me the text of this page image"; the
//! engine behind it is pluggable so tests can substitute a fake and other
//! engines can be added without touching the fallback logic.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from OCR backends.
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Backend not available: {0}")]
    BackendNotAvailable(String),

    #[error("OCR failed: {0}")]
    OcrFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of OCR processing.
#[derive(Debug, Clone)]
pub struct OcrResult {
    /// Extracted text content.
    pub text: String,
    /// Which backend produced this result.
    pub backend: &'static str,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Trait for OCR backends.
pub trait OcrBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Check if this backend is available (dependencies installed).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this backend available.
    fn availability_hint(&self) -> String;

    /// Run OCR on an image file.
    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError>;

    /// Render one page of a PDF (1-based) and run OCR on it.
    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<OcrResult, OcrError>;
}

/// OCR settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Tesseract language (e.g. "eng", "eng+hin").
    #[serde(default = "default_language")]
    pub language: String,
    /// Render resolution for scanned pages.
    #[serde(default = "default_dpi")]
    pub dpi: u32,
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_dpi() -> u32 {
    300
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            dpi: default_dpi(),
        }
    }
}

impl OcrConfig {
    /// Apply environment variable overrides.
    ///
    /// - `OCR_LANGUAGE`: Tesseract language string
    /// - `OCR_DPI`: render resolution
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("OCR_LANGUAGE") {
            if !val.trim().is_empty() {
                self.language = val;
            }
        }
        if let Ok(val) = std::env::var("OCR_DPI") {
            if let Ok(dpi) = val.parse() {
                self.dpi = dpi;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OcrConfig::default();
        assert_eq!(config.language, "eng");
        assert_eq!(config.dpi, 300);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: OcrConfig = toml::from_str(r#"language = "eng+hin""#).unwrap();
        assert_eq!(config.language, "eng+hin");
        assert_eq!(config.dpi, 300);
    }
}
