//! Litigation tracker - structured field extraction from legal notices.
//!
//! Turns scanned and digital notice documents into schema-conformant tabular
//! records: text extraction with per-page OCR fallback, field extraction
//! through an LLM service, and normalization onto a versioned field schema.

pub mod config;
pub mod export;
pub mod llm;
pub mod models;
pub mod ocr;
pub mod rate_limit;
pub mod schema;
pub mod services;
pub mod utils;
