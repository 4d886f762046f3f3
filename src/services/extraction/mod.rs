//! Notice extraction pipeline.
//!
//! Turns a set of documents into one schema-conformant record each:
//! text extraction (native text layer, OCR fallback), field extraction
//! through the configured service, then normalization onto the schema.
//! Separated from UI concerns - emits events for progress tracking.

mod cancel;
mod client;
mod normalizer;
mod response;
mod strategy;
mod types;

use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::models::{Document, NormalizedRecord, RawExtraction, RecordError, RecordErrorKind, ResultSet};
use crate::ocr::DocumentTextExtractor;
use crate::schema::FieldSchema;
use crate::utils::non_whitespace_chars;

pub use cancel::RunCancellation;
pub use client::{FieldExtractionClient, FieldOutcome};
pub use normalizer::{normalize, normalize_failed};
pub use response::{parse_array_response, parse_object_response, ParsedResponse};
pub use strategy::{BatchedStrategy, FieldExtractionStrategy, SingleDocumentStrategy, StrategyKind};
pub use types::{PipelineEvent, RunOutcome, RunState, RunSummary};

/// Where a document stands after text extraction.
enum TextStage {
    Ready(String),
    Empty,
    Failed(RecordError),
}

/// Orchestrates text extraction, field extraction and normalization.
pub struct Pipeline {
    extractor: Arc<dyn DocumentTextExtractor>,
    client: FieldExtractionClient,
    strategy: Box<dyn FieldExtractionStrategy>,
    workers: usize,
    events: Option<mpsc::Sender<PipelineEvent>>,
    cancellation: RunCancellation,
}

impl Pipeline {
    /// Create a pipeline with a single worker slot.
    pub fn new(
        extractor: Arc<dyn DocumentTextExtractor>,
        client: FieldExtractionClient,
        strategy: Box<dyn FieldExtractionStrategy>,
    ) -> Self {
        Self {
            extractor,
            client,
            strategy,
            workers: 1,
            events: None,
            cancellation: RunCancellation::new(),
        }
    }

    /// Bound on concurrent text extractions and, for per-document runs,
    /// concurrent service calls.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_events(mut self, events: mpsc::Sender<PipelineEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_cancellation(mut self, cancellation: RunCancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn cancellation(&self) -> RunCancellation {
        self.cancellation.clone()
    }

    pub fn schema(&self) -> &Arc<FieldSchema> {
        self.client.schema()
    }

    /// Process `documents` into one record each, in input order.
    ///
    /// Per-document failures become annotated empty records; nothing here
    /// aborts the run. On cancellation, finished records are kept and the
    /// rest are annotated `Cancelled`.
    pub async fn run(&self, documents: Vec<Document>) -> RunOutcome {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "pipeline_run",
            run_id = %run_id,
            strategy = %self.strategy.kind(),
            schema = %self.schema().version()
        );
        self.run_documents(run_id, documents).instrument(span).await
    }

    async fn run_documents(&self, run_id: String, documents: Vec<Document>) -> RunOutcome {
        let started = Instant::now();
        let total = documents.len();
        let schema = Arc::clone(self.schema());

        info!(
            "Processing {} documents ({} strategy, {} workers)",
            total,
            self.strategy.kind(),
            self.workers
        );
        self.emit(PipelineEvent::RunStarted {
            run_id: run_id.clone(),
            total_documents: total,
            strategy: self.strategy.kind(),
        })
        .await;

        let documents: Vec<Arc<Document>> = documents.into_iter().map(Arc::new).collect();
        let semaphore = Semaphore::new(self.workers);
        let concurrency = self.strategy.group_concurrency(self.workers);

        let mut slots: Vec<Option<NormalizedRecord>> = (0..total).map(|_| None).collect();
        let mut groups = stream::iter(self.strategy.plan(total))
            .map(|range| self.process_group(range, &documents, &semaphore))
            .buffer_unordered(concurrency);

        while let Some(records) = groups.next().await {
            for (index, record) in records {
                slots[index] = Some(record);
            }
        }
        drop(groups);

        let cancelled = self.cancellation.is_cancelled();
        let mut results = ResultSet::new(Arc::clone(&schema));
        for (index, slot) in slots.into_iter().enumerate() {
            let record = slot.unwrap_or_else(|| {
                let error = if cancelled {
                    cancelled_error()
                } else {
                    RecordError::new(RecordErrorKind::MalformedResponse, "no result produced")
                };
                normalize_failed(&documents[index].filename, &schema, error)
            });
            results.push(record);
        }

        let summary =
            RunSummary::from_records(run_id, results.records(), cancelled, started.elapsed());
        info!(
            "Run finished: {} succeeded, {} empty, {} degraded in {:.1}s{}",
            summary.succeeded,
            summary.empty,
            summary.degraded_total(),
            summary.elapsed.as_secs_f64(),
            if cancelled { " (cancelled)" } else { "" }
        );
        self.emit(PipelineEvent::RunComplete {
            summary: summary.clone(),
        })
        .await;

        RunOutcome { results, summary }
    }

    /// Run one planned group through every stage.
    async fn process_group(
        &self,
        range: Range<usize>,
        documents: &[Arc<Document>],
        semaphore: &Semaphore,
    ) -> Vec<(usize, NormalizedRecord)> {
        let indices: Vec<usize> = range.collect();
        let schema = self.schema();
        let mut records = Vec::with_capacity(indices.len());

        if self.cancellation.is_cancelled() {
            for &index in &indices {
                records.push((index, self.cancel(index, &documents[index]).await));
            }
            return records;
        }

        self.emit(PipelineEvent::StateChanged {
            documents: indices.clone(),
            state: RunState::ExtractingText,
        })
        .await;

        let stages = join_all(
            indices
                .iter()
                .map(|&index| self.extract_text(index, &documents[index], semaphore)),
        )
        .await;

        let mut ready: Vec<(usize, String)> = Vec::new();
        for (&index, stage) in indices.iter().zip(stages) {
            let source = &documents[index].filename;
            match stage {
                TextStage::Ready(text) => ready.push((index, text)),
                TextStage::Empty => {
                    let record = normalize(&RawExtraction::new(), source, schema);
                    records.push((index, self.complete(index, record).await));
                }
                TextStage::Failed(error) => {
                    records.push((index, self.fail(index, source, error).await));
                }
            }
        }

        if ready.is_empty() {
            return records;
        }

        if self.cancellation.is_cancelled() {
            for (index, _) in &ready {
                records.push((*index, self.cancel(*index, &documents[*index]).await));
            }
            return records;
        }

        let ready_indices: Vec<usize> = ready.iter().map(|(index, _)| *index).collect();
        self.emit(PipelineEvent::StateChanged {
            documents: ready_indices.clone(),
            state: RunState::RequestingFields,
        })
        .await;

        let pairs: Vec<(&str, &str)> = ready
            .iter()
            .map(|(index, text)| (documents[*index].filename.as_str(), text.as_str()))
            .collect();

        let outcomes = tokio::select! {
            outcomes = self.strategy.request_fields(&self.client, &pairs) => Some(outcomes),
            _ = self.cancellation.cancelled() => None,
        };

        let Some(outcomes) = outcomes else {
            debug!("Field request abandoned for {} documents", ready.len());
            for index in ready_indices {
                records.push((index, self.cancel(index, &documents[index]).await));
            }
            return records;
        };

        self.emit(PipelineEvent::StateChanged {
            documents: ready_indices.clone(),
            state: RunState::Normalizing,
        })
        .await;

        for (index, outcome) in ready_indices.iter().copied().zip(outcomes) {
            let source = &documents[index].filename;
            let record = match outcome.error {
                Some(error) => self.fail(index, source, error).await,
                None => {
                    let record = normalize(&outcome.raw, source, schema);
                    self.complete(index, record).await
                }
            };
            records.push((index, record));
        }

        self.emit(PipelineEvent::StateChanged {
            documents: indices,
            state: RunState::Complete,
        })
        .await;

        records
    }

    /// Extract one document's text on the blocking pool.
    async fn extract_text(
        &self,
        index: usize,
        document: &Arc<Document>,
        semaphore: &Semaphore,
    ) -> TextStage {
        let _permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => return TextStage::Failed(cancelled_error()),
        };
        if self.cancellation.is_cancelled() {
            return TextStage::Failed(cancelled_error());
        }

        self.emit(PipelineEvent::DocumentStarted {
            index,
            source: document.filename.clone(),
        })
        .await;

        let extractor = Arc::clone(&self.extractor);
        let doc = Arc::clone(document);
        let result = tokio::task::spawn_blocking(move || extractor.extract(&doc)).await;

        match result {
            Ok(Ok(extracted)) => {
                let text = extracted.text();
                debug!(
                    "{}: {} pages ({} via OCR), {} bytes of text",
                    document.filename,
                    extracted.page_count(),
                    extracted.ocr_pages(),
                    text.len()
                );
                self.emit(PipelineEvent::TextExtracted {
                    index,
                    pages: extracted.page_count(),
                    ocr_pages: extracted.ocr_pages(),
                    chars: non_whitespace_chars(&text),
                })
                .await;

                if extracted.is_empty() {
                    info!("{}: no text recovered, skipping field extraction", document.filename);
                    TextStage::Empty
                } else {
                    TextStage::Ready(text)
                }
            }
            Ok(Err(e)) => TextStage::Failed(RecordError::new(
                RecordErrorKind::DocumentUnreadable,
                e.to_string(),
            )),
            Err(e) => TextStage::Failed(RecordError::new(
                RecordErrorKind::DocumentUnreadable,
                format!("text extraction task failed: {}", e),
            )),
        }
    }

    async fn complete(&self, index: usize, record: NormalizedRecord) -> NormalizedRecord {
        debug!("{}: record complete", record.source());
        self.emit(PipelineEvent::DocumentCompleted {
            index,
            source: record.source().to_string(),
            empty: record.is_blank(),
        })
        .await;
        record
    }

    async fn fail(&self, index: usize, source: &str, error: RecordError) -> NormalizedRecord {
        if error.kind != RecordErrorKind::Cancelled {
            warn!("{}: {}", source, error);
        }
        self.emit(PipelineEvent::DocumentFailed {
            index,
            source: source.to_string(),
            error: error.clone(),
        })
        .await;
        normalize_failed(source, self.schema(), error)
    }

    async fn cancel(&self, index: usize, document: &Document) -> NormalizedRecord {
        self.fail(index, &document.filename, cancelled_error()).await
    }

    async fn emit(&self, event: PipelineEvent) {
        if let Some(ref events) = self.events {
            let _ = events.send(event).await;
        }
    }
}

fn cancelled_error() -> RecordError {
    RecordError::new(RecordErrorKind::Cancelled, "run cancelled before completion")
}
