//! Pipeline events, run states and summaries.

use std::collections::BTreeMap;
use std::time::Duration;

use super::strategy::StrategyKind;
use crate::models::{NormalizedRecord, RecordError, RecordErrorKind, ResultSet};

/// Stage a group of documents is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    ExtractingText,
    RequestingFields,
    Normalizing,
    Complete,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ExtractingText => "extracting text",
            Self::RequestingFields => "requesting fields",
            Self::Normalizing => "normalizing",
            Self::Complete => "complete",
        }
    }
}

/// Events emitted during a pipeline run.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Run accepted its documents
    RunStarted {
        run_id: String,
        total_documents: usize,
        strategy: StrategyKind,
    },
    /// A group of documents (by input index) entered a new stage
    StateChanged {
        documents: Vec<usize>,
        state: RunState,
    },
    /// Text extraction for a document started
    DocumentStarted { index: usize, source: String },
    /// Text extraction for a document finished
    TextExtracted {
        index: usize,
        pages: usize,
        ocr_pages: usize,
        chars: usize,
    },
    /// Record produced without an error annotation
    DocumentCompleted {
        index: usize,
        source: String,
        empty: bool,
    },
    /// Record degraded with an error annotation
    DocumentFailed {
        index: usize,
        source: String,
        error: RecordError,
    },
    /// Every record is in place
    RunComplete { summary: RunSummary },
}

/// Counts describing how a run went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub total: usize,
    /// Records with at least one extracted value
    pub succeeded: usize,
    /// Records with no values and no error (nothing to extract)
    pub empty: usize,
    /// Degraded records by error kind
    pub degraded: BTreeMap<RecordErrorKind, usize>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn from_records(
        run_id: impl Into<String>,
        records: &[NormalizedRecord],
        cancelled: bool,
        elapsed: Duration,
    ) -> Self {
        let mut summary = Self {
            run_id: run_id.into(),
            total: records.len(),
            succeeded: 0,
            empty: 0,
            degraded: BTreeMap::new(),
            cancelled,
            elapsed,
        };

        for record in records {
            match record.error() {
                Some(error) => *summary.degraded.entry(error.kind).or_default() += 1,
                None if record.is_blank() => summary.empty += 1,
                None => summary.succeeded += 1,
            }
        }
        summary
    }

    pub fn degraded_total(&self) -> usize {
        self.degraded.values().sum()
    }
}

/// Records of a run together with its summary.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub results: ResultSet,
    pub summary: RunSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use std::sync::Arc;

    #[test]
    fn test_summary_counts() {
        let schema = Arc::new(FieldSchema::new("t", ["A"]).unwrap());
        let records = vec![
            NormalizedRecord::new(schema.clone(), vec!["x".to_string()], "a.pdf", None),
            NormalizedRecord::new(schema.clone(), vec![], "b.pdf", None),
            NormalizedRecord::degraded(
                schema.clone(),
                "c.pdf",
                RecordError::new(RecordErrorKind::ServiceTimeout, "120s"),
            ),
            NormalizedRecord::degraded(
                schema,
                "d.pdf",
                RecordError::new(RecordErrorKind::ServiceTimeout, "120s"),
            ),
        ];

        let summary = RunSummary::from_records("run", &records, false, Duration::ZERO);

        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.empty, 1);
        assert_eq!(summary.degraded[&RecordErrorKind::ServiceTimeout], 2);
        assert_eq!(summary.degraded_total(), 2);
    }
}
