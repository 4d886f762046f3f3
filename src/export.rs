//! Tabular export of a result set.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::models::ResultSet;
use crate::schema::ERROR_FIELD;

/// Default output file for `extract`.
pub const DEFAULT_OUTPUT_PATH: &str = "litigation_tracker_output.csv";

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
    Jsonl,
}

impl ExportFormat {
    /// Guess the format from an output path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::Jsonl),
            _ => None,
        }
    }
}

/// Write `results` to `writer`.
///
/// Columns follow the schema, then `Source`. An `Error` column is added only
/// when at least one record is annotated.
pub fn write_result_set<W: Write>(
    results: &ResultSet,
    format: ExportFormat,
    mut writer: W,
) -> io::Result<()> {
    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, results)?;
            writeln!(writer)?;
        }
        ExportFormat::Jsonl => {
            for record in results.records() {
                serde_json::to_writer(&mut writer, record)?;
                writeln!(writer)?;
            }
        }
        ExportFormat::Csv => {
            let with_errors = results.has_errors();

            let mut header: Vec<String> = results
                .schema()
                .columns()
                .map(escape_csv)
                .collect();
            if with_errors {
                header.push(ERROR_FIELD.to_string());
            }
            writeln!(writer, "{}", header.join(","))?;

            for record in results.records() {
                let mut row: Vec<String> = record.entries().map(|(_, v)| escape_csv(v)).collect();
                if with_errors {
                    let error = record.error().map(|e| e.to_string()).unwrap_or_default();
                    row.push(escape_csv(&error));
                }
                writeln!(writer, "{}", row.join(","))?;
            }
        }
    }
    writer.flush()
}

/// Write `results` to a file, creating or truncating it.
pub fn export_to_path(results: &ResultSet, format: ExportFormat, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_result_set(results, format, BufWriter::new(file))
}

/// Escape a string for CSV output.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NormalizedRecord, RecordError, RecordErrorKind};
    use crate::schema::FieldSchema;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn schema() -> Arc<FieldSchema> {
        Arc::new(FieldSchema::new("t", ["Entity Name", "Total"]).unwrap())
    }

    fn clean_set() -> ResultSet {
        let mut results = ResultSet::new(schema());
        results.push(NormalizedRecord::new(
            schema(),
            vec!["Acme, Ltd".to_string(), "1,25,000".to_string()],
            "a.pdf",
            None,
        ));
        results
    }

    fn export(results: &ResultSet, format: ExportFormat) -> String {
        let mut out = Vec::new();
        write_result_set(results, format, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_csv_without_errors_has_no_error_column() {
        let csv = export(&clean_set(), ExportFormat::Csv);
        assert_eq!(csv, "Entity Name,Total,Source\n\"Acme, Ltd\",\"1,25,000\",a.pdf\n");
    }

    #[test]
    fn test_csv_with_errors_appends_error_column() {
        let mut results = clean_set();
        results.push(NormalizedRecord::degraded(
            schema(),
            "b.pdf",
            RecordError::new(RecordErrorKind::DocumentUnreadable, "bad \"xref\""),
        ));

        let csv = export(&results, ExportFormat::Csv);
        let lines: Vec<_> = csv.lines().collect();
        assert_eq!(lines[0], "Entity Name,Total,Source,Error");
        assert_eq!(lines[1], "\"Acme, Ltd\",\"1,25,000\",a.pdf,");
        assert_eq!(
            lines[2],
            ",,b.pdf,\"DocumentUnreadable: bad \"\"xref\"\"\""
        );
    }

    #[test]
    fn test_jsonl_one_object_per_record_in_column_order() {
        let jsonl = export(&clean_set(), ExportFormat::Jsonl);
        assert_eq!(
            jsonl,
            "{\"Entity Name\":\"Acme, Ltd\",\"Total\":\"1,25,000\",\"Source\":\"a.pdf\"}\n"
        );
    }

    #[test]
    fn test_json_is_array() {
        let json = export(&clean_set(), ExportFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().unwrap().len(), 1);
        assert_eq!(value[0]["Source"], "a.pdf");
    }

    #[test]
    fn test_export_to_path_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("notices.csv");
        export_to_path(&clean_set(), ExportFormat::Csv, &path).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Entity Name"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ExportFormat::from_path(Path::new("x.JSONL")), Some(ExportFormat::Jsonl));
        assert_eq!(ExportFormat::from_path(Path::new("x.xlsx")), None);
        assert_eq!(ExportFormat::from_path(Path::new("x")), None);
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("line\nbreak"), "\"line\nbreak\"");
    }
}
