//! Helpers for the external Poppler and Tesseract command-line tools.

use std::io;
use std::process::{ExitStatus, Output};

pub const PDFINFO_NOT_FOUND: &str = "pdfinfo (install poppler-utils)";
pub const PDFTOTEXT_NOT_FOUND: &str = "pdftotext (install poppler-utils)";
pub const PDFTOPPM_NOT_FOUND: &str = "pdftoppm (install poppler-utils)";
pub const TESSERACT_NOT_FOUND: &str = "tesseract (install tesseract-ocr)";

/// Tools the extractor shells out to.
pub const REQUIRED_TOOLS: &[&str] = &["pdfinfo", "pdftotext", "pdftoppm", "tesseract"];

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    which::which(name).is_ok()
}

/// Failure modes of one tool invocation.
#[derive(Debug)]
pub enum ToolFailure {
    /// The binary is not installed.
    NotFound,
    /// It ran and exited non-zero; carries stderr.
    Failed(String),
    /// Spawning failed for another reason.
    Io(io::Error),
}

/// Turn a command's output into stdout text or a `ToolFailure`.
pub fn stdout_or_failure(result: io::Result<Output>) -> Result<String, ToolFailure> {
    match result {
        Ok(output) if output.status.success() => {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        }
        Ok(output) => Err(ToolFailure::Failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ToolFailure::NotFound),
        Err(e) => Err(ToolFailure::Io(e)),
    }
}

/// Check a command's exit status.
pub fn status_or_failure(result: io::Result<ExitStatus>) -> Result<(), ToolFailure> {
    match result {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(ToolFailure::Failed(format!("exited with {}", status))),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(ToolFailure::NotFound),
        Err(e) => Err(ToolFailure::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn test_missing_binary_is_not_found() {
        assert!(!check_binary("definitely-not-a-real-tool-4f1c"));
        let result = Command::new("definitely-not-a-real-tool-4f1c").output();
        assert!(matches!(stdout_or_failure(result), Err(ToolFailure::NotFound)));
    }

    #[cfg(unix)]
    #[test]
    fn test_stdout_and_failure_from_shell() {
        let ok = Command::new("sh").args(["-c", "printf hello"]).output();
        assert_eq!(stdout_or_failure(ok).unwrap(), "hello");

        let failed = Command::new("sh").args(["-c", "echo boom >&2; exit 3"]).output();
        match stdout_or_failure(failed) {
            Err(ToolFailure::Failed(stderr)) => assert_eq!(stderr, "boom"),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
