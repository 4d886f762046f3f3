//! Input documents and the text recovered from them.

use std::path::Path;

use serde::Serialize;

/// One uploaded document: raw bytes plus the filename used as provenance.
///
/// Filenames are not required to be unique within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a document from disk, using the file name (not the full path) as provenance.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { filename, bytes })
    }
}

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageTextSource {
    /// Embedded text layer.
    Native,
    /// Rendered and OCR'd.
    Ocr,
    /// Neither path produced anything.
    Empty,
}

/// Text for one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageText {
    /// 1-based page number.
    pub page_number: u32,
    pub text: String,
    pub source: PageTextSource,
}

/// Concatenated page texts of one document, in page order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedText {
    pub mime_type: String,
    pub pages: Vec<PageText>,
}

impl ExtractedText {
    pub fn new(mime_type: impl Into<String>, pages: Vec<PageText>) -> Self {
        Self {
            mime_type: mime_type.into(),
            pages,
        }
    }

    /// All page texts joined with newlines.
    pub fn text(&self) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// True when no page yielded any non-whitespace text.
    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Number of pages whose text came from OCR.
    pub fn ocr_pages(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.source == PageTextSource::Ocr)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn page(n: u32, text: &str, source: PageTextSource) -> PageText {
        PageText {
            page_number: n,
            text: text.to_string(),
            source,
        }
    }

    #[test]
    fn test_text_joins_pages_in_order() {
        let extracted = ExtractedText::new(
            "application/pdf",
            vec![
                page(1, "first", PageTextSource::Native),
                page(2, "second", PageTextSource::Ocr),
            ],
        );
        assert_eq!(extracted.text(), "first\nsecond");
        assert_eq!(extracted.ocr_pages(), 1);
        assert!(!extracted.is_empty());
    }

    #[test]
    fn test_whitespace_only_pages_are_empty() {
        let extracted = ExtractedText::new(
            "application/pdf",
            vec![page(1, " \n ", PageTextSource::Empty)],
        );
        assert!(extracted.is_empty());
        assert!(ExtractedText::new("application/pdf", vec![]).is_empty());
    }

    #[test]
    fn test_from_path_uses_file_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notice-01.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let doc = Document::from_path(&path).unwrap();
        assert_eq!(doc.filename, "notice-01.pdf");
        assert_eq!(doc.bytes, b"%PDF-1.4");
    }
}
