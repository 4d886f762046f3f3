//! MIME sniffing and document-kind classification.

/// How a document's bytes should be turned into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Paged document with an optional native text layer.
    Pdf,
    /// Single raster image, always OCR'd.
    Image,
    /// Plain text, read directly.
    Text,
    /// Anything the extractor cannot open.
    Unsupported,
}

impl DocumentKind {
    /// Classify a sniffed MIME type.
    pub fn from_mime(mime: &str) -> Self {
        match mime.to_lowercase().as_str() {
            "application/pdf" => Self::Pdf,
            "image/png" | "image/jpeg" | "image/tiff" | "image/gif" | "image/bmp" => Self::Image,
            "text/plain" => Self::Text,
            _ => Self::Unsupported,
        }
    }
}

/// Detect the MIME type of a byte stream from its content.
///
/// Magic-number detection comes first. Bytes with no recognizable signature
/// that decode as UTF-8 without NULs are reported as `text/plain`; everything
/// else falls back to `application/octet-stream`.
pub fn detect_mime(bytes: &[u8]) -> &'static str {
    if let Some(kind) = infer::get(bytes) {
        return kind.mime_type();
    }
    if !bytes.is_empty() && !bytes.contains(&0) && std::str::from_utf8(bytes).is_ok() {
        return "text/plain";
    }
    "application/octet-stream"
}

/// File extension used when handing bytes of this MIME type to external tools.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "application/pdf" => "pdf",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/tiff" => "tif",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "text/plain" => "txt",
        _ => "bin",
    }
}
