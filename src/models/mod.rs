//! Data models for the extraction pipeline.

mod document;
mod record;

pub use document::{Document, ExtractedText, PageText, PageTextSource};
pub use record::{NormalizedRecord, RawExtraction, RecordError, RecordErrorKind, ResultSet};
