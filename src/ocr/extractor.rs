//! Document-to-text conversion with per-page OCR fallback.
//!
//! Each PDF page is read from its embedded text layer first. Pages whose layer
//! is empty after trimming are rendered and OCR'd instead, so a notice that
//! mixes digital and scanned pages recovers text from both.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::backend::{OcrBackend, OcrConfig};
use super::tesseract::TesseractBackend;
use super::text_layer::{PageTextLayer, PopplerTextLayer};
use super::tools::{check_binary, REQUIRED_TOOLS};
use crate::models::{Document, ExtractedText, PageText, PageTextSource};
use crate::utils::{detect_mime, extension_for_mime, DocumentKind};

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Document unreadable: {0}")]
    DocumentUnreadable(String),

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Converts one document into best-effort plain text.
pub trait DocumentTextExtractor: Send + Sync {
    /// Extract the text of every page, in page order.
    ///
    /// Fails only when the document cannot be opened at all; page-level
    /// problems degrade to empty page text.
    fn extract(&self, document: &Document) -> Result<ExtractedText, ExtractionError>;
}

/// Text extractor backed by a PDF text layer and an OCR engine.
pub struct TextExtractor {
    text_layer: Arc<dyn PageTextLayer>,
    ocr: Arc<dyn OcrBackend>,
}

impl TextExtractor {
    /// Poppler text layer with Tesseract OCR.
    pub fn new(config: OcrConfig) -> Self {
        Self {
            text_layer: Arc::new(PopplerTextLayer::new()),
            ocr: Arc::new(TesseractBackend::with_config(config)),
        }
    }

    /// Custom text layer and OCR backend.
    pub fn with_backends(text_layer: Arc<dyn PageTextLayer>, ocr: Arc<dyn OcrBackend>) -> Self {
        Self { text_layer, ocr }
    }

    /// Extract every page of a PDF on disk.
    pub fn extract_pdf(&self, pdf_path: &Path) -> Result<Vec<PageText>, ExtractionError> {
        let page_count = self.text_layer.page_count(pdf_path)?;
        debug!("{} has {} pages", pdf_path.display(), page_count);

        Ok((1..=page_count)
            .map(|page| self.extract_pdf_page(pdf_path, page))
            .collect())
    }

    /// Native text if the page has any, OCR otherwise.
    fn extract_pdf_page(&self, pdf_path: &Path, page: u32) -> PageText {
        let native = match self.text_layer.page_text(pdf_path, page) {
            Ok(text) => text,
            Err(e) => {
                debug!("Text layer failed on page {}, trying OCR: {}", page, e);
                String::new()
            }
        };

        if !native.trim().is_empty() {
            return PageText {
                page_number: page,
                text: native.trim_end().to_string(),
                source: PageTextSource::Native,
            };
        }

        debug!("Page {} has no text layer, running {} OCR", page, self.ocr.name());
        match self.ocr.ocr_pdf_page(pdf_path, page) {
            Ok(result) => {
                debug!(
                    "OCR of page {} took {}ms ({} chars)",
                    page,
                    result.processing_time_ms,
                    result.text.len()
                );
                ocr_page(page, result.text)
            }
            Err(e) => {
                warn!("OCR failed for page {}: {}", page, e);
                ocr_page(page, String::new())
            }
        }
    }

    /// OCR a single image as one page.
    fn extract_image(&self, image_path: &Path) -> PageText {
        match self.ocr.ocr_image(image_path) {
            Ok(result) => ocr_page(1, result.text),
            Err(e) => {
                warn!("OCR failed for image {}: {}", image_path.display(), e);
                ocr_page(1, String::new())
            }
        }
    }

    /// Check if required tools are available.
    pub fn check_tools() -> Vec<(String, bool)> {
        REQUIRED_TOOLS
            .iter()
            .map(|tool| (tool.to_string(), check_binary(tool)))
            .collect()
    }
}

impl DocumentTextExtractor for TextExtractor {
    fn extract(&self, document: &Document) -> Result<ExtractedText, ExtractionError> {
        let mime = detect_mime(&document.bytes);
        debug!("{} detected as {}", document.filename, mime);

        let pages = match DocumentKind::from_mime(mime) {
            DocumentKind::Pdf => {
                let file = spill_to_temp(document, mime)?;
                self.extract_pdf(file.path())?
            }
            DocumentKind::Image => {
                let file = spill_to_temp(document, mime)?;
                vec![self.extract_image(file.path())]
            }
            DocumentKind::Text => {
                let text = String::from_utf8_lossy(&document.bytes).into_owned();
                let source = if text.trim().is_empty() {
                    PageTextSource::Empty
                } else {
                    PageTextSource::Native
                };
                vec![PageText {
                    page_number: 1,
                    text,
                    source,
                }]
            }
            DocumentKind::Unsupported => {
                return Err(ExtractionError::UnsupportedFileType(mime.to_string()))
            }
        };

        Ok(ExtractedText::new(mime, pages))
    }
}

fn ocr_page(page: u32, text: String) -> PageText {
    let source = if text.trim().is_empty() {
        PageTextSource::Empty
    } else {
        PageTextSource::Ocr
    };
    PageText {
        page_number: page,
        text: text.trim_end().to_string(),
        source,
    }
}

/// Write document bytes to a temp file the external tools can open.
fn spill_to_temp(
    document: &Document,
    mime: &str,
) -> Result<tempfile::NamedTempFile, ExtractionError> {
    let suffix = format!(".{}", extension_for_mime(mime));
    let mut file = tempfile::Builder::new()
        .prefix("notice-")
        .suffix(&suffix)
        .tempfile()?;
    file.write_all(&document.bytes)?;
    file.flush()?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::backend::{OcrError, OcrResult};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Text layer with canned per-page text.
    struct FakeTextLayer {
        pages: Option<Vec<&'static str>>,
    }

    impl PageTextLayer for FakeTextLayer {
        fn page_count(&self, _: &Path) -> Result<u32, ExtractionError> {
            self.pages
                .as_ref()
                .map(|p| p.len() as u32)
                .ok_or_else(|| ExtractionError::DocumentUnreadable("corrupt xref".to_string()))
        }

        fn page_text(&self, _: &Path, page: u32) -> Result<String, ExtractionError> {
            let pages = self.pages.as_ref().unwrap();
            Ok(pages[(page - 1) as usize].to_string())
        }
    }

    /// OCR backend with canned per-page text that counts its calls.
    struct FakeOcr {
        pages: HashMap<u32, Result<&'static str, ()>>,
        calls: AtomicUsize,
    }

    impl FakeOcr {
        fn new(pages: &[(u32, Result<&'static str, ()>)]) -> Self {
            Self {
                pages: pages.iter().cloned().collect(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl OcrBackend for FakeOcr {
        fn name(&self) -> &'static str {
            "fake"
        }
        fn is_available(&self) -> bool {
            true
        }
        fn availability_hint(&self) -> String {
            String::new()
        }
        fn ocr_image(&self, _: &Path) -> Result<OcrResult, OcrError> {
            self.ocr_pdf_page(Path::new(""), 1)
        }
        fn ocr_pdf_page(&self, _: &Path, page: u32) -> Result<OcrResult, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.pages.get(&page) {
                Some(Ok(text)) => Ok(OcrResult {
                    text: text.to_string(),
                    backend: "fake",
                    processing_time_ms: 0,
                }),
                _ => Err(OcrError::OcrFailed("engine crashed".to_string())),
            }
        }
    }

    fn extractor(pages: Option<Vec<&'static str>>, ocr: Arc<FakeOcr>) -> TextExtractor {
        TextExtractor::with_backends(Arc::new(FakeTextLayer { pages }), ocr)
    }

    fn pdf(name: &str) -> Document {
        Document::new(name, b"%PDF-1.4\n1 0 obj\n".to_vec())
    }

    #[test]
    fn test_mixed_document_recovers_both_pages() {
        let ocr = Arc::new(FakeOcr::new(&[(2, Ok("SCANNED DEMAND ORDER"))]));
        let extractor = extractor(Some(vec!["Form GST ASMT-10\n", "  \n\x0c"]), ocr.clone());

        let extracted = extractor.extract(&pdf("mixed.pdf")).unwrap();

        assert_eq!(extracted.mime_type, "application/pdf");
        assert_eq!(extracted.pages[0].source, PageTextSource::Native);
        assert_eq!(extracted.pages[1].source, PageTextSource::Ocr);
        assert_eq!(extracted.text(), "Form GST ASMT-10\nSCANNED DEMAND ORDER");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_native_pages_skip_ocr() {
        let ocr = Arc::new(FakeOcr::new(&[]));
        let extractor = extractor(Some(vec!["page one", "page two"]), ocr.clone());

        let extracted = extractor.extract(&pdf("digital.pdf")).unwrap();

        assert_eq!(extracted.text(), "page one\npage two");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ocr_failure_yields_empty_page_not_error() {
        let ocr = Arc::new(FakeOcr::new(&[(1, Err(()))]));
        let extractor = extractor(Some(vec![""]), ocr);

        let extracted = extractor.extract(&pdf("scan.pdf")).unwrap();

        assert_eq!(extracted.page_count(), 1);
        assert_eq!(extracted.pages[0].source, PageTextSource::Empty);
        assert!(extracted.is_empty());
    }

    #[test]
    fn test_unopenable_pdf_is_unreadable() {
        let extractor = extractor(None, Arc::new(FakeOcr::new(&[])));
        let err = extractor.extract(&pdf("corrupt.pdf")).unwrap_err();
        assert!(matches!(err, ExtractionError::DocumentUnreadable(_)));
    }

    #[test]
    fn test_unsupported_bytes_are_rejected() {
        let extractor = extractor(Some(vec![]), Arc::new(FakeOcr::new(&[])));
        let zip = Document::new("archive.zip", b"PK\x03\x04\x14\x00\x00\x00".to_vec());
        let err = extractor.extract(&zip).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFileType(_)));
    }

    #[test]
    fn test_plain_text_is_read_directly() {
        let ocr = Arc::new(FakeOcr::new(&[]));
        let extractor = extractor(Some(vec![]), ocr.clone());
        let doc = Document::new("notice.txt", b"GSTIN: 27AAAAA0000A1Z5".to_vec());

        let extracted = extractor.extract(&doc).unwrap();

        assert_eq!(extracted.text(), "GSTIN: 27AAAAA0000A1Z5");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_check_tools_lists_every_tool() {
        let tools = TextExtractor::check_tools();
        let names: Vec<_> = tools.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, REQUIRED_TOOLS);
    }
}
