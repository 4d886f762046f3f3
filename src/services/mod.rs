//! Service layer for notice extraction.
//!
//! This module contains domain logic separated from UI concerns.
//! Services can be used by the CLI or embedded in other interfaces.

pub mod extraction;

pub use extraction::{
    FieldExtractionClient, Pipeline, PipelineEvent, RunCancellation, RunOutcome, RunState,
    RunSummary, StrategyKind,
};
