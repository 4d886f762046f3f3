//! Schema listing command.

use console::style;

use litigation_tracker::config::Config;
use litigation_tracker::schema::SOURCE_FIELD;

/// Print every known schema version with its columns.
pub fn cmd_schemas(config: &Config) -> anyhow::Result<()> {
    let registry = config.schema_registry()?;
    let selected = config.pipeline.schema_version.as_str();

    for schema in registry.iter() {
        let marker = if schema.version() == selected {
            style("*").green().to_string()
        } else {
            " ".to_string()
        };
        println!(
            "\n{} {} ({} fields)",
            marker,
            style(schema.version()).bold(),
            schema.len()
        );
        for (i, field) in schema.fields().iter().enumerate() {
            println!("    {:>2}. {}", i + 1, field);
        }
        println!("        {}", style(format!("+ {} (file name)", SOURCE_FIELD)).dim());
    }
    println!();

    Ok(())
}
