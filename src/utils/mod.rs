//! Shared utility functions.
//!
//! - `mime`: content sniffing and document-kind classification
//! - `text`: UTF-8 safe truncation and display helpers

mod mime;
mod text;

pub use mime::{detect_mime, extension_for_mime, DocumentKind};
pub use text::{non_whitespace_chars, truncate_display, truncate_utf8};
