//! Native PDF text-layer access via Poppler.

use std::path::Path;
use std::process::Command;

use super::extractor::ExtractionError;
use super::tools::{stdout_or_failure, ToolFailure, PDFINFO_NOT_FOUND, PDFTOTEXT_NOT_FOUND};

/// Reads page counts and embedded page text from a PDF.
pub trait PageTextLayer: Send + Sync {
    /// Number of pages. Failure here means the document cannot be opened.
    fn page_count(&self, pdf_path: &Path) -> Result<u32, ExtractionError>;

    /// Embedded text of one page (1-based). May be empty for scanned pages.
    fn page_text(&self, pdf_path: &Path, page: u32) -> Result<String, ExtractionError>;
}

/// `pdfinfo` / `pdftotext` backed text layer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PopplerTextLayer;

impl PopplerTextLayer {
    pub fn new() -> Self {
        Self
    }
}

impl PageTextLayer for PopplerTextLayer {
    fn page_count(&self, pdf_path: &Path) -> Result<u32, ExtractionError> {
        let output = Command::new("pdfinfo").arg(pdf_path).output();
        let stdout = match stdout_or_failure(output) {
            Ok(stdout) => stdout,
            Err(ToolFailure::NotFound) => {
                return Err(ExtractionError::ToolNotFound(PDFINFO_NOT_FOUND.to_string()))
            }
            Err(ToolFailure::Failed(stderr)) => {
                return Err(ExtractionError::DocumentUnreadable(format!(
                    "pdfinfo could not open document: {}",
                    stderr
                )))
            }
            Err(ToolFailure::Io(e)) => return Err(ExtractionError::Io(e)),
        };

        parse_page_count(&stdout).ok_or_else(|| {
            ExtractionError::DocumentUnreadable("pdfinfo reported no page count".to_string())
        })
    }

    fn page_text(&self, pdf_path: &Path, page: u32) -> Result<String, ExtractionError> {
        let page_str = page.to_string();
        let output = Command::new("pdftotext")
            .args(["-layout", "-enc", "UTF-8", "-f", &page_str, "-l", &page_str])
            .arg(pdf_path)
            .arg("-")
            .output();

        match stdout_or_failure(output) {
            Ok(text) => Ok(text),
            Err(ToolFailure::NotFound) => {
                Err(ExtractionError::ToolNotFound(PDFTOTEXT_NOT_FOUND.to_string()))
            }
            Err(ToolFailure::Failed(stderr)) => Err(ExtractionError::ExtractionFailed(format!(
                "pdftotext failed on page {}: {}",
                page, stderr
            ))),
            Err(ToolFailure::Io(e)) => Err(ExtractionError::Io(e)),
        }
    }
}

/// Pull the `Pages:` value out of pdfinfo output.
fn parse_page_count(pdfinfo_stdout: &str) -> Option<u32> {
    pdfinfo_stdout
        .lines()
        .find(|line| line.starts_with("Pages:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_page_count() {
        let info = "Title:          Notice\nProducer:       GSTN\nPages:          3\nEncrypted:      no\n";
        assert_eq!(parse_page_count(info), Some(3));
        assert_eq!(parse_page_count("Title: x\n"), None);
        assert_eq!(parse_page_count("Pages: many\n"), None);
    }
}
