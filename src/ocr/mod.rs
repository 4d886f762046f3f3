//! Text extraction from notice documents.
//!
//! Extracts text using:
//! - pdfinfo / pdftotext (Poppler) for the embedded PDF text layer
//! - pdftoppm + Tesseract OCR for pages without a text layer and for images
//!
//! The text layer and the OCR engine sit behind `PageTextLayer` and
//! `OcrBackend` so the per-page fallback can be exercised without the tools.

mod backend;
mod extractor;
mod pdf_utils;
mod tesseract;
mod text_layer;
mod tools;

pub use backend::{OcrBackend, OcrConfig, OcrError, OcrResult};
pub use extractor::{DocumentTextExtractor, ExtractionError, TextExtractor};
pub use tesseract::TesseractBackend;
pub use text_layer::{PageTextLayer, PopplerTextLayer};
pub use tools::check_binary;
