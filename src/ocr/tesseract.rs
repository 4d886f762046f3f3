//! Tesseract OCR backend implementation.
//!
//! Uses Tesseract via command-line; PDF pages are rendered with pdftoppm first.

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use tempfile::TempDir;

use super::backend::{OcrBackend, OcrConfig, OcrError, OcrResult};
use super::pdf_utils;
use super::tools::{check_binary, stdout_or_failure, ToolFailure, TESSERACT_NOT_FOUND};

/// Tesseract OCR backend.
pub struct TesseractBackend {
    config: OcrConfig,
}

impl TesseractBackend {
    pub fn new() -> Self {
        Self {
            config: OcrConfig::default(),
        }
    }

    pub fn with_config(config: OcrConfig) -> Self {
        Self { config }
    }

    /// Run Tesseract on an image file.
    fn run_tesseract(&self, image_path: &Path) -> Result<String, OcrError> {
        let output = Command::new("tesseract")
            .arg(image_path)
            .arg("stdout")
            .args(["-l", &self.config.language])
            .output();

        match stdout_or_failure(output) {
            Ok(text) => Ok(text),
            Err(ToolFailure::NotFound) => Err(OcrError::BackendNotAvailable(
                TESSERACT_NOT_FOUND.to_string(),
            )),
            Err(ToolFailure::Failed(stderr)) => {
                Err(OcrError::OcrFailed(format!("tesseract failed: {}", stderr)))
            }
            Err(ToolFailure::Io(e)) => Err(OcrError::Io(e)),
        }
    }
}

impl Default for TesseractBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBackend for TesseractBackend {
    fn name(&self) -> &'static str {
        "tesseract"
    }

    fn is_available(&self) -> bool {
        check_binary("tesseract") && check_binary("pdftoppm")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "Tesseract not installed. Install with: apt install tesseract-ocr".to_string()
        } else if !check_binary("pdftoppm") {
            "pdftoppm not installed. Install with: apt install poppler-utils".to_string()
        } else {
            format!("Tesseract is available (language: {})", self.config.language)
        }
    }

    fn ocr_image(&self, image_path: &Path) -> Result<OcrResult, OcrError> {
        let start = Instant::now();
        let text = self.run_tesseract(image_path)?;

        Ok(OcrResult {
            text,
            backend: self.name(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn ocr_pdf_page(&self, pdf_path: &Path, page: u32) -> Result<OcrResult, OcrError> {
        let start = Instant::now();

        let temp_dir = TempDir::new()?;
        let image_path =
            pdf_utils::pdf_page_to_image(pdf_path, page, self.config.dpi, temp_dir.path())?;
        let text = self.run_tesseract(&image_path)?;

        Ok(OcrResult {
            text,
            backend: self.name(),
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_availability_hint_mentions_install_or_language() {
        let backend = TesseractBackend::with_config(OcrConfig {
            language: "eng+hin".to_string(),
            dpi: 200,
        });
        let hint = backend.availability_hint();
        if backend.is_available() {
            assert!(hint.contains("eng+hin"));
        } else {
            assert!(hint.contains("Install"));
        }
    }

    #[test]
    fn test_missing_image_fails_without_panicking() {
        let backend = TesseractBackend::new();
        let result = backend.ocr_image(Path::new("/nonexistent/page-1.png"));
        assert!(result.is_err());
    }
}
