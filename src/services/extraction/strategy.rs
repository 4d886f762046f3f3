//! One call per document vs. one call per batch.

use std::ops::Range;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::client::{FieldExtractionClient, FieldOutcome};

/// Which field extraction strategy a run uses.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// One service call per document.
    #[default]
    Single,
    /// One service call covering many documents.
    Batched,
}

impl StrategyKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "single" | "per-document" => Some(Self::Single),
            "batched" | "batch" => Some(Self::Batched),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Batched => "batched",
        }
    }

    /// Build the strategy. `max_batch_size` only affects `Batched`.
    pub fn build(self, max_batch_size: Option<usize>) -> Box<dyn FieldExtractionStrategy> {
        match self {
            Self::Single => Box::new(SingleDocumentStrategy),
            Self::Batched => Box::new(BatchedStrategy::new(max_batch_size)),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How documents are grouped into service calls.
///
/// The pipeline runs each group through text extraction, one field request,
/// and normalization. Groups never share a service call.
#[async_trait]
pub trait FieldExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Consecutive index ranges covering `0..document_count`.
    fn plan(&self, document_count: usize) -> Vec<Range<usize>>;

    /// Groups allowed in flight at once with `workers` worker slots.
    fn group_concurrency(&self, workers: usize) -> usize;

    /// Request fields for one group of `(source, text)` pairs.
    ///
    /// Returns exactly one outcome per input, in input order.
    async fn request_fields(
        &self,
        client: &FieldExtractionClient,
        documents: &[(&str, &str)],
    ) -> Vec<FieldOutcome>;
}

/// One service call per document; documents proceed independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleDocumentStrategy;

#[async_trait]
impl FieldExtractionStrategy for SingleDocumentStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Single
    }

    fn plan(&self, document_count: usize) -> Vec<Range<usize>> {
        (0..document_count).map(|i| i..i + 1).collect()
    }

    fn group_concurrency(&self, workers: usize) -> usize {
        workers.max(1)
    }

    async fn request_fields(
        &self,
        client: &FieldExtractionClient,
        documents: &[(&str, &str)],
    ) -> Vec<FieldOutcome> {
        let mut outcomes = Vec::with_capacity(documents.len());
        for (_, text) in documents {
            outcomes.push(client.extract_fields(text).await);
        }
        outcomes
    }
}

/// All documents (or consecutive chunks of them) share one service call.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchedStrategy {
    max_batch_size: Option<usize>,
}

impl BatchedStrategy {
    pub fn new(max_batch_size: Option<usize>) -> Self {
        Self {
            max_batch_size: max_batch_size.filter(|&n| n > 0),
        }
    }
}

#[async_trait]
impl FieldExtractionStrategy for BatchedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Batched
    }

    fn plan(&self, document_count: usize) -> Vec<Range<usize>> {
        if document_count == 0 {
            return Vec::new();
        }
        let size = self.max_batch_size.unwrap_or(document_count);
        (0..document_count)
            .step_by(size)
            .map(|start| start..(start + size).min(document_count))
            .collect()
    }

    fn group_concurrency(&self, _workers: usize) -> usize {
        1
    }

    async fn request_fields(
        &self,
        client: &FieldExtractionClient,
        documents: &[(&str, &str)],
    ) -> Vec<FieldOutcome> {
        client.extract_fields_batch(documents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_plan_is_one_group_per_document() {
        let plan = SingleDocumentStrategy.plan(3);
        assert_eq!(plan, vec![0..1, 1..2, 2..3]);
        assert_eq!(SingleDocumentStrategy.group_concurrency(4), 4);
        assert_eq!(SingleDocumentStrategy.group_concurrency(0), 1);
    }

    #[test]
    fn test_batched_plan_is_one_group_by_default() {
        let strategy = BatchedStrategy::new(None);
        assert_eq!(strategy.plan(5), vec![0..5]);
        assert!(strategy.plan(0).is_empty());
        assert_eq!(strategy.group_concurrency(8), 1);
    }

    #[test]
    fn test_batched_plan_chunks() {
        let strategy = BatchedStrategy::new(Some(2));
        assert_eq!(strategy.plan(5), vec![0..2, 2..4, 4..5]);
        assert_eq!(BatchedStrategy::new(Some(0)).plan(3), vec![0..3]);
    }

    #[test]
    fn test_kind_parsing_and_build() {
        assert_eq!(StrategyKind::from_str("BATCH"), Some(StrategyKind::Batched));
        assert_eq!(StrategyKind::from_str("parallel"), None);
        assert_eq!(StrategyKind::Batched.build(None).kind(), StrategyKind::Batched);
        assert_eq!(StrategyKind::default().build(None).kind(), StrategyKind::Single);
    }
}
