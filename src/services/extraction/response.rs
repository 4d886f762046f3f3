//! Tolerant parsing of extraction service responses.
//!
//! The whole response is first deserialized strictly (after removing a
//! surrounding markdown code fence). If that fails, the top-level balanced
//! spans of the response are tried in order, so commentary before or after
//! the JSON does not lose the payload. Spans nested inside another span are
//! never candidates: a broken outer payload is malformed, not a source of
//! partial data.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::models::RawExtraction;

/// Give up after this many top-level spans.
const MAX_CANDIDATES: usize = 32;

/// Outcome of parsing one service response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse<T> {
    /// Structured data was recovered.
    Parsed(T),
    /// Nothing usable; carries the raw response text.
    Malformed(String),
}

impl<T> ParsedResponse<T> {
    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed(_))
    }

    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(value) => Some(value),
            Self::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Object,
    Array,
}

impl Shape {
    /// Accept a parsed value of this shape. A one-element array holding an
    /// object also satisfies the object shape.
    fn accept(self, value: Value) -> Option<Value> {
        match (self, value) {
            (Shape::Object, value @ Value::Object(_)) => Some(value),
            (Shape::Object, Value::Array(mut items))
                if items.len() == 1 && items[0].is_object() =>
            {
                items.pop()
            }
            (Shape::Array, value @ Value::Array(_)) => Some(value),
            _ => None,
        }
    }
}

fn code_fence_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$")
            .expect("code fence regex is valid")
    })
}

/// Strip one surrounding markdown code fence, if present.
fn strip_code_fence(text: &str) -> &str {
    match code_fence_regex().captures(text).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => text.trim(),
    }
}

/// Parse a single-document response into one extraction.
pub fn parse_object_response(text: &str) -> ParsedResponse<RawExtraction> {
    match parse_shape(text, Shape::Object) {
        Some(Value::Object(map)) => ParsedResponse::Parsed(RawExtraction::from_json_object(&map)),
        _ => ParsedResponse::Malformed(text.to_string()),
    }
}

/// Parse a batch response into one extraction per returned item.
///
/// Items that are not JSON objects become empty extractions so positions stay
/// aligned with the request.
pub fn parse_array_response(text: &str) -> ParsedResponse<Vec<RawExtraction>> {
    match parse_shape(text, Shape::Array) {
        Some(Value::Array(items)) => ParsedResponse::Parsed(
            items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => RawExtraction::from_json_object(map),
                    _ => RawExtraction::new(),
                })
                .collect(),
        ),
        _ => ParsedResponse::Malformed(text.to_string()),
    }
}

fn parse_shape(text: &str, shape: Shape) -> Option<Value> {
    let body = strip_code_fence(text);
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(value) = shape.accept(value) {
            return Some(value);
        }
    }

    let mut rest = text;
    for _ in 0..MAX_CANDIDATES {
        let start = rest.find(['{', '['])?;
        let span = balanced_span(&rest[start..])?;
        if let Ok(value) = serde_json::from_str::<Value>(span) {
            if let Some(value) = shape.accept(value) {
                return Some(value);
            }
        }
        rest = &rest[start + span.len()..];
    }
    None
}

/// The balanced span starting at the first char of `text`.
///
/// Brackets inside JSON string literals are ignored. `None` when the span
/// never closes or closes with the wrong bracket.
fn balanced_span(text: &str) -> Option<&str> {
    let mut expected_closers = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => expected_closers.push('}'),
            '[' => expected_closers.push(']'),
            '}' | ']' => {
                if expected_closers.pop()? != c {
                    return None;
                }
                if expected_closers.is_empty() {
                    return Some(&text[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE: &str = r#"{"Entity Name": "Acme Traders", "GSTIN": "27AAAAA0000A1Z5"}"#;

    #[test]
    fn test_bare_object() {
        let parsed = parse_object_response(BARE).parsed().unwrap();
        assert_eq!(parsed.get("Entity Name"), Some("Acme Traders"));
    }

    #[test]
    fn test_prose_wrapped_object_matches_bare() {
        let wrapped = format!(
            "Sure! Here are the details you asked for:\n{}\nLet me know if you need more.",
            BARE
        );
        assert_eq!(parse_object_response(&wrapped), parse_object_response(BARE));
    }

    #[test]
    fn test_code_fenced_object() {
        let fenced = format!("```json\n{}\n```", BARE);
        assert_eq!(parse_object_response(&fenced), parse_object_response(BARE));
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_scanner() {
        let text = r#"Result: {"Description": "Demand u/s 73 {see annexure} \"A\"", "GSTIN": ""} done"#;
        let parsed = parse_object_response(text).parsed().unwrap();
        assert_eq!(
            parsed.get("Description"),
            Some(r#"Demand u/s 73 {see annexure} "A""#)
        );
        assert_eq!(parsed.get("GSTIN"), Some(""));
    }

    #[test]
    fn test_skips_unparseable_candidate() {
        let text = r#"Fields {Entity Name} are below: {"GSTIN": "X"}"#;
        let parsed = parse_object_response(text).parsed().unwrap();
        assert_eq!(parsed.get("GSTIN"), Some("X"));
    }

    #[test]
    fn test_no_json_is_malformed() {
        let text = "I could not find any notice details in this document.";
        assert_eq!(
            parse_object_response(text),
            ParsedResponse::Malformed(text.to_string())
        );
        assert!(!parse_object_response("{\"unterminated\": ").is_parsed());
    }

    #[test]
    fn test_array_response_keeps_positions() {
        let text = r#"Here you go: [{"GSTIN": "A"}, "n/a", {"GSTIN": "C"}] thanks"#;
        let items = parse_array_response(text).parsed().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].get("GSTIN"), Some("A"));
        assert!(items[1].is_empty());
        assert_eq!(items[2].get("GSTIN"), Some("C"));
    }

    #[test]
    fn test_array_expected_but_object_returned() {
        assert!(!parse_array_response(BARE).is_parsed());
    }

    #[test]
    fn test_object_inside_array_for_single_form() {
        let text = r#"[{"GSTIN": "A"}]"#;
        let parsed = parse_object_response(text).parsed().unwrap();
        assert_eq!(parsed.get("GSTIN"), Some("A"));
    }

    #[test]
    fn test_balanced_span_rejects_mismatched_close() {
        assert_eq!(balanced_span("{]"), None);
        assert_eq!(balanced_span("{\"a\": [1}]"), None);
        assert_eq!(balanced_span("{\"a\": [1]} tail"), Some("{\"a\": [1]}"));
    }

    #[test]
    fn test_broken_object_does_not_yield_nested_object() {
        let text = r#"{"Entity Name": "Acme", "Meta": {"Ref ID": "R1"},}"#;
        assert_eq!(
            parse_object_response(text),
            ParsedResponse::Malformed(text.to_string())
        );
    }

    #[test]
    fn test_broken_array_does_not_yield_nested_array() {
        let text = r#"[{"Entity Name": "A", "Refs": ["x", "y"]}, {"Entity Name": "B"},]"#;
        assert_eq!(
            parse_array_response(text),
            ParsedResponse::Malformed(text.to_string())
        );
    }

    #[test]
    fn test_wrapper_object_is_not_a_batch() {
        let text = r#"Done: {"results": [{"GSTIN": "A"}, {"GSTIN": "B"}]}"#;
        assert!(!parse_array_response(text).is_parsed());
    }

    #[test]
    fn test_unclosed_prefix_hides_later_spans() {
        let text = r#"{"Entity Name": "Acme", "GSTIN": {"x": 1}"#;
        assert!(!parse_object_response(text).is_parsed());
    }
}
