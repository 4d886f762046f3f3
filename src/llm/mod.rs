//! Field extraction service transport.

mod client;

pub use client::{
    field_list, FieldExtractionService, LlmClient, LlmConfig, LlmError, LlmProvider,
    DEFAULT_BATCH_PROMPT, DEFAULT_SINGLE_PROMPT,
};
