//! Field extraction requests against the configured service.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use super::response::{parse_array_response, parse_object_response, ParsedResponse};
use crate::llm::{field_list, FieldExtractionService, LlmConfig, LlmError};
use crate::models::{RawExtraction, RecordError, RecordErrorKind};
use crate::schema::FieldSchema;
use crate::utils::{truncate_display, truncate_utf8};

/// Raw response text kept in error annotations.
const RESPONSE_EXCERPT_CHARS: usize = 120;

/// Field extraction result for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOutcome {
    /// Extracted values; empty when the call failed.
    pub raw: RawExtraction,
    /// Why the values are empty, if they are because of a failure.
    pub error: Option<RecordError>,
}

impl FieldOutcome {
    pub fn extracted(raw: RawExtraction) -> Self {
        Self { raw, error: None }
    }

    pub fn failed(error: RecordError) -> Self {
        Self {
            raw: RawExtraction::new(),
            error: Some(error),
        }
    }
}

/// One entry of the batch payload embedded in the prompt.
#[derive(Debug, Serialize)]
struct BatchItem<'a> {
    source: &'a str,
    text: &'a str,
}

/// Builds prompts for a schema and turns service responses into extractions.
pub struct FieldExtractionClient {
    service: Arc<dyn FieldExtractionService>,
    schema: Arc<FieldSchema>,
    single_prompt: String,
    batch_prompt: String,
    max_content_chars: usize,
    timeout: Duration,
}

impl FieldExtractionClient {
    pub fn new(
        service: Arc<dyn FieldExtractionService>,
        schema: Arc<FieldSchema>,
        config: &LlmConfig,
    ) -> Self {
        Self {
            service,
            schema,
            single_prompt: config.get_single_prompt().to_string(),
            batch_prompt: config.get_batch_prompt().to_string(),
            max_content_chars: config.max_content_chars,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        &self.schema
    }

    /// Prompt for a single document.
    pub fn build_single_prompt(&self, text: &str) -> String {
        self.single_prompt
            .replace("{fields}", &field_list(self.schema.fields()))
            .replace("{content}", truncate_utf8(text, self.max_content_chars))
    }

    /// Prompt covering several `(source, text)` documents.
    pub fn build_batch_prompt(&self, documents: &[(&str, &str)]) -> String {
        let items: Vec<BatchItem<'_>> = documents
            .iter()
            .map(|&(source, text)| BatchItem {
                source,
                text: truncate_utf8(text, self.max_content_chars),
            })
            .collect();
        let payload = serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string());

        self.batch_prompt
            .replace("{fields}", &field_list(self.schema.fields()))
            .replace("{documents}", &payload)
    }

    /// Extract fields from one document's text.
    pub async fn extract_fields(&self, text: &str) -> FieldOutcome {
        let prompt = self.build_single_prompt(text);
        let response = match self.call(&prompt).await {
            Ok(response) => response,
            Err(e) => return FieldOutcome::failed(service_error(&e)),
        };

        match parse_object_response(&response) {
            ParsedResponse::Parsed(raw) => {
                debug!("Parsed {} keys from response", raw.len());
                FieldOutcome::extracted(raw)
            }
            ParsedResponse::Malformed(raw_text) => {
                FieldOutcome::failed(malformed("no JSON object in response", &raw_text))
            }
        }
    }

    /// Extract fields for several documents with one call.
    ///
    /// Always returns exactly one outcome per input, in input order. Missing
    /// trailing items are annotated; extra items are ignored.
    pub async fn extract_fields_batch(&self, documents: &[(&str, &str)]) -> Vec<FieldOutcome> {
        let expected = documents.len();
        if expected == 0 {
            return Vec::new();
        }

        let prompt = self.build_batch_prompt(documents);
        let response = match self.call(&prompt).await {
            Ok(response) => response,
            Err(e) => {
                let error = service_error(&e);
                return vec![FieldOutcome::failed(error); expected];
            }
        };

        let mut items = match parse_array_response(&response) {
            ParsedResponse::Parsed(items) => items,
            ParsedResponse::Malformed(raw_text) => {
                let error = malformed("no JSON array in response", &raw_text);
                return vec![FieldOutcome::failed(error); expected];
            }
        };

        let returned = items.len();
        if returned > expected {
            debug!("Ignoring {} extra batch items", returned - expected);
            items.truncate(expected);
        }

        let mut outcomes: Vec<FieldOutcome> =
            items.into_iter().map(FieldOutcome::extracted).collect();

        if returned < expected {
            warn!(
                "Valid batch response held {} of {} items; padding the rest",
                returned, expected
            );
            outcomes.extend((returned..expected).map(|position| {
                FieldOutcome::failed(RecordError::new(
                    RecordErrorKind::MalformedResponse,
                    format!(
                        "item {} of {} missing from an otherwise valid batch response",
                        position + 1,
                        expected
                    ),
                ))
            }));
        }

        outcomes
    }

    /// One service call bounded by the per-call timeout.
    async fn call(&self, prompt: &str) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.service.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        }
    }
}

fn service_error(e: &LlmError) -> RecordError {
    warn!("Field extraction call failed: {}", e);
    RecordError::new(e.record_kind(), e.to_string())
}

fn malformed(reason: &str, raw_text: &str) -> RecordError {
    let excerpt = truncate_display(raw_text.trim(), RESPONSE_EXCERPT_CHARS);
    warn!("{}: {}", reason, excerpt);
    RecordError::new(
        RecordErrorKind::MalformedResponse,
        format!("{}: {}", reason, excerpt),
    )
}
