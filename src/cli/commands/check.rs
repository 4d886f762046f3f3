//! Environment check command.

use console::style;

use litigation_tracker::config::{Config, RunConfig};
use litigation_tracker::llm::{LlmClient, LlmProvider};
use litigation_tracker::ocr::{OcrBackend, TesseractBackend, TextExtractor};

/// Report tool availability, LLM settings and configuration validity.
pub async fn cmd_check(config: &Config) -> anyhow::Result<()> {
    let mut all_ok = true;

    println!("\n{}", style("Text Extraction Tools").bold());
    println!("{}", "-".repeat(50));
    for (tool, available) in TextExtractor::check_tools() {
        let status = if available {
            style("✓ found").green()
        } else {
            all_ok = false;
            style("✗ not found").red()
        };
        println!("  {:<15} {}", tool, status);
    }

    let tesseract = TesseractBackend::with_config(config.ocr.clone());
    println!(
        "  {:<15} {}",
        "OCR",
        style(tesseract.availability_hint()).dim()
    );

    println!("\n{}", style("Field Extraction Service").bold());
    println!("{}", "-".repeat(50));
    println!("  {:<15} {}", "Provider", config.llm.provider);
    println!("  {:<15} {}", "Model", config.llm.model());
    println!("  {:<15} {}", "Endpoint", config.llm.endpoint());
    println!("  {:<15} {}s", "Timeout", config.llm.timeout_secs);

    match LlmClient::new(config.llm.clone()) {
        Ok(client) => {
            let reachable = client.is_available().await;
            let status = match (config.llm.provider, reachable) {
                (LlmProvider::Ollama, true) => style("✓ reachable").green(),
                (LlmProvider::Ollama, false) => {
                    all_ok = false;
                    style("✗ not reachable").red()
                }
                (_, _) => style("✓ API key set").green(),
            };
            println!("  {:<15} {}", "Status", status);
        }
        Err(e) => {
            all_ok = false;
            println!("  {:<15} {}", "Status", style(format!("✗ {}", e)).red());
        }
    }

    println!("\n{}", style("Configuration").bold());
    println!("{}", "-".repeat(50));
    match config.source_path {
        Some(ref path) => println!("  {:<15} {}", "File", path.display()),
        None => println!("  {:<15} {}", "File", style("none (defaults)").dim()),
    }
    match RunConfig::validate(config) {
        Ok(run) => {
            println!("  {:<15} {}", "Schema", run.schema.version());
            println!("  {:<15} {}", "Strategy", run.strategy);
            println!("  {:<15} {}", "Workers", run.workers);
        }
        Err(e) => {
            all_ok = false;
            println!("  {:<15} {}", "Error", style(e).red());
        }
    }

    println!();
    if all_ok {
        println!("{} Ready to extract notices", style("✓").green());
    } else {
        println!(
            "{} Some checks failed. Install poppler-utils and tesseract-ocr, and set an API key",
            style("!").yellow()
        );
    }

    Ok(())
}
