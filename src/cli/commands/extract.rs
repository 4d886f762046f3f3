//! Notice extraction command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use console::style;
use tokio::sync::mpsc;

use litigation_tracker::config::{expand_path, Config, RunConfig};
use litigation_tracker::export::{export_to_path, write_result_set, ExportFormat, DEFAULT_OUTPUT_PATH};
use litigation_tracker::llm::LlmClient;
use litigation_tracker::models::Document;
use litigation_tracker::ocr::TextExtractor;
use litigation_tracker::services::{
    FieldExtractionClient, Pipeline, PipelineEvent, RunCancellation, StrategyKind,
};

use crate::cli::progress;

/// File extensions picked up when a directory is given.
const DOCUMENT_EXTENSIONS: [&str; 7] = ["pdf", "png", "jpg", "jpeg", "tif", "tiff", "txt"];

#[derive(clap::Args)]
pub struct ExtractArgs {
    /// Notice files, or directories of them
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Field extraction strategy
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyKind>,

    /// Schema version for output records
    #[arg(long)]
    schema: Option<String>,

    /// Concurrent worker slots
    #[arg(short, long)]
    workers: Option<usize>,

    /// Split batched runs into calls of at most this many documents
    #[arg(long)]
    batch_size: Option<usize>,

    /// Output file ("-" for stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (defaults to the output file's extension, else csv)
    #[arg(short, long, value_enum)]
    format: Option<ExportFormat>,
}

/// Run the pipeline over the given files and export the records.
pub async fn cmd_extract(mut config: Config, args: ExtractArgs) -> anyhow::Result<()> {
    if let Some(strategy) = args.strategy {
        config.pipeline.strategy = strategy;
    }
    if let Some(schema) = args.schema {
        config.pipeline.schema_version = schema;
    }
    if let Some(workers) = args.workers {
        config.pipeline.workers = workers;
    }
    if let Some(batch_size) = args.batch_size {
        config.pipeline.max_batch_size = Some(batch_size);
    }

    let run = RunConfig::validate(&config).context("Invalid configuration")?;

    let paths = collect_paths(&args.files)?;
    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        let document = Document::from_path(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        documents.push(document);
    }

    let llm = LlmClient::new(config.llm.clone()).context("Failed to create LLM client")?;
    eprintln!(
        "{} Extracting {} fields from {} documents via {}",
        style("→").cyan(),
        run.schema.version(),
        documents.len(),
        llm.describe()
    );

    let client = FieldExtractionClient::new(Arc::new(llm), Arc::clone(&run.schema), &config.llm);
    let extractor = Arc::new(TextExtractor::new(config.ocr.clone()));

    let (event_tx, event_rx) = mpsc::channel::<PipelineEvent>(100);
    let event_handler = tokio::spawn(progress::report_progress(event_rx));

    let cancellation = RunCancellation::new();
    let ctrl_c = {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "\n{} Interrupted, writing records finished so far...",
                    style("!").yellow()
                );
                cancellation.cancel();
            }
        })
    };

    let pipeline = Pipeline::new(extractor, client, run.strategy.build(run.max_batch_size))
        .with_workers(run.workers)
        .with_events(event_tx)
        .with_cancellation(cancellation);

    let outcome = pipeline.run(documents).await;
    drop(pipeline);
    ctrl_c.abort();
    let _ = event_handler.await;

    let output = args
        .output
        .map(|p| expand_path(&p))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_PATH));
    let format = args
        .format
        .or_else(|| ExportFormat::from_path(&output))
        .unwrap_or_default();

    if output == Path::new("-") {
        write_result_set(&outcome.results, format, std::io::stdout().lock())
            .context("Failed to write records to stdout")?;
    } else {
        export_to_path(&outcome.results, format, &output)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        eprintln!(
            "{} Wrote {} records to {}",
            style("✓").green(),
            outcome.results.len(),
            output.display()
        );
    }

    Ok(())
}

/// Expand directories into their document files, keeping argument order.
fn collect_paths(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        let input = expand_path(input);
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(&input)
                .with_context(|| format!("Failed to list {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && has_document_extension(path))
                .collect();
            found.sort();
            if found.is_empty() {
                tracing::warn!("No documents found in {}", input.display());
            }
            paths.extend(found);
        } else if input.is_file() {
            paths.push(input);
        } else {
            bail!("No such file or directory: {}", input.display());
        }
    }

    if paths.is_empty() {
        bail!("No documents to process");
    }
    Ok(paths)
}

fn has_document_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_paths_expands_directories_sorted() {
        let dir = TempDir::new().unwrap();
        for name in ["b.pdf", "a.PDF", "notes.md", "c.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let paths = collect_paths(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.PDF", "b.pdf", "c.txt"]);
    }

    #[test]
    fn test_collect_paths_rejects_missing_input() {
        let err = collect_paths(&[PathBuf::from("/nonexistent/notice.pdf")]).unwrap_err();
        assert!(err.to_string().contains("No such file"));
    }
}
