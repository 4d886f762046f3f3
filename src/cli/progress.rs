//! Terminal progress for pipeline runs.

use std::io::{self, Write};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use litigation_tracker::services::{PipelineEvent, RunState, RunSummary};

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

/// Render pipeline events until the sender side is dropped.
pub async fn report_progress(mut event_rx: mpsc::Receiver<PipelineEvent>) {
    let mut progress: Option<ProgressBar> = None;

    while let Some(event) = event_rx.recv().await {
        match event {
            PipelineEvent::RunStarted {
                total_documents,
                strategy,
                ..
            } => {
                let bar = ProgressBar::new(total_documents as u64);
                bar.set_style(bar_style());
                bar.set_message(format!("Starting ({} strategy)...", strategy));
                progress = Some(bar);
            }
            PipelineEvent::StateChanged { documents, state } => {
                if let Some(ref bar) = progress {
                    match state {
                        RunState::RequestingFields if documents.len() > 1 => {
                            bar.set_message(format!(
                                "Requesting fields for {} documents...",
                                documents.len()
                            ));
                        }
                        RunState::ExtractingText if documents.len() > 1 => {
                            bar.set_message(format!(
                                "Extracting text from {} documents...",
                                documents.len()
                            ));
                        }
                        _ => {}
                    }
                }
            }
            PipelineEvent::DocumentStarted { source, .. } => {
                if let Some(ref bar) = progress {
                    bar.set_message(format!("Reading {}", source));
                }
            }
            PipelineEvent::TextExtracted { ocr_pages, pages, .. } => {
                if let Some(ref bar) = progress {
                    if ocr_pages > 0 {
                        bar.set_message(format!("OCR'd {} of {} pages", ocr_pages, pages));
                    }
                }
            }
            PipelineEvent::DocumentCompleted { source, empty, .. } => {
                if let Some(ref bar) = progress {
                    if empty {
                        bar.suspend(|| {
                            eprintln!("  {} {}: no text found", style("!").yellow(), source);
                        });
                    }
                    bar.inc(1);
                }
            }
            PipelineEvent::DocumentFailed { source, error, .. } => {
                let line = format!("  {} {}: {}", style("✗").red(), source, error);
                match progress {
                    Some(ref bar) => {
                        bar.suspend(|| eprintln!("{}", line));
                        bar.inc(1);
                    }
                    None => eprintln!("{}", line),
                }
            }
            PipelineEvent::RunComplete { summary } => {
                if let Some(bar) = progress.take() {
                    bar.finish_and_clear();
                }
                print_summary(&summary);
            }
        }
    }
}

/// Summary goes to stderr so `--output -` leaves stdout to the records.
fn print_summary(summary: &RunSummary) {
    let _ = write_summary(&mut std::io::stderr().lock(), summary);
}

fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
    writeln!(
        out,
        "{} Processed {} documents in {:.1}s: {} extracted, {} empty, {} degraded",
        if summary.cancelled {
            style("!").yellow()
        } else {
            style("✓").green()
        },
        summary.total,
        summary.elapsed.as_secs_f64(),
        summary.succeeded,
        summary.empty,
        summary.degraded_total()
    )?;
    for (kind, count) in &summary.degraded {
        writeln!(out, "  {} {}: {}", style("-").dim(), kind, count)?;
    }
    if summary.cancelled {
        writeln!(
            out,
            "  {} Run was cancelled; unfinished documents are marked Cancelled",
            style("!").yellow()
        )?;
    }
    Ok(())
}
