//! Extraction payloads, normalized records and the per-run result set.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::schema::{FieldSchema, ERROR_FIELD, SOURCE_FIELD};

/// Unvalidated key/value payload returned by the extraction service for one document.
///
/// Keys are whatever the service produced; they are matched against the
/// schema only during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawExtraction(BTreeMap<String, String>);

impl RawExtraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a JSON object into display strings.
    ///
    /// Strings are kept verbatim, `null` becomes empty, and any other value is
    /// rendered in its compact JSON form. No coercion beyond that.
    pub fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        let map = object
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    Value::Null => String::new(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect();
        Self(map)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawExtraction {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Why a record was degraded to empty fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordErrorKind {
    /// The document could not be opened or parsed.
    DocumentUnreadable,
    /// The extraction service failed or refused the request.
    ServiceUnavailable,
    /// The extraction service did not answer within the call timeout.
    ServiceTimeout,
    /// The response held no usable structured data.
    MalformedResponse,
    /// The run was cancelled before this document finished.
    Cancelled,
}

impl RecordErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DocumentUnreadable => "DocumentUnreadable",
            Self::ServiceUnavailable => "ServiceUnavailable",
            Self::ServiceTimeout => "ServiceTimeout",
            Self::MalformedResponse => "MalformedResponse",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for RecordErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error annotation carried by a degraded record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    pub kind: RecordErrorKind,
    pub message: String,
}

impl RecordError {
    pub fn new(kind: RecordErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

/// Schema-conformant output row for one document.
///
/// Holds one value per schema field, in schema order, plus the pipeline-derived
/// `Source`. Serializes as an ordered map so column order survives export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    schema: Arc<FieldSchema>,
    values: Vec<String>,
    source: String,
    error: Option<RecordError>,
}

impl NormalizedRecord {
    /// Build a record. `values` must line up with `schema.fields()`; missing
    /// trailing values are filled with empty strings and extras are dropped.
    pub fn new(
        schema: Arc<FieldSchema>,
        mut values: Vec<String>,
        source: impl Into<String>,
        error: Option<RecordError>,
    ) -> Self {
        values.resize(schema.len(), String::new());
        Self {
            schema,
            values,
            source: source.into(),
            error,
        }
    }

    /// All-empty record annotated with `error`.
    pub fn degraded(schema: Arc<FieldSchema>, source: impl Into<String>, error: RecordError) -> Self {
        Self::new(schema, Vec::new(), source, Some(error))
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn error(&self) -> Option<&RecordError> {
        self.error.as_ref()
    }

    /// Value of a column by name. `Source` resolves to the provenance filename.
    pub fn get(&self, column: &str) -> Option<&str> {
        if column == SOURCE_FIELD {
            return Some(&self.source);
        }
        self.schema
            .fields()
            .iter()
            .position(|f| f == column)
            .map(|i| self.values[i].as_str())
    }

    /// Schema field values in order (without `Source`).
    pub fn values(&self) -> &[String] {
        &self.values
    }

    /// Column/value pairs in output order, ending with `Source`.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.schema
            .fields()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
            .chain(std::iter::once((SOURCE_FIELD, self.source.as_str())))
    }

    /// True when every schema field is empty.
    pub fn is_blank(&self) -> bool {
        self.values.iter().all(|v| v.is_empty())
    }
}

impl Serialize for NormalizedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let len = self.values.len() + 1 + usize::from(self.error.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (column, value) in self.entries() {
            map.serialize_entry(column, value)?;
        }
        if let Some(ref error) = self.error {
            map.serialize_entry(ERROR_FIELD, &error.to_string())?;
        }
        map.end()
    }
}

/// Ordered records of one run, one per input document in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultSet {
    schema: Arc<FieldSchema>,
    records: Vec<NormalizedRecord>,
}

impl ResultSet {
    pub fn new(schema: Arc<FieldSchema>) -> Self {
        Self {
            schema,
            records: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, record: NormalizedRecord) {
        self.records.push(record);
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn records(&self) -> &[NormalizedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// True when at least one record carries an error annotation.
    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|r| r.error.is_some())
    }

    pub fn into_records(self) -> Vec<NormalizedRecord> {
        self.records
    }
}

impl Serialize for ResultSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in &self.records {
            seq.serialize_element(record)?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    fn schema() -> Arc<FieldSchema> {
        Arc::new(FieldSchema::new("t", ["Entity Name", "GSTIN"]).unwrap())
    }

    #[test]
    fn test_raw_extraction_from_json_renders_display_text() {
        let value = serde_json::json!({
            "GSTIN": "27AAAAA0000A1Z5",
            "Total": 125000.5,
            "Paid": false,
            "Due Date": null,
            "Refs": ["A", "B"]
        });
        let raw = RawExtraction::from_json_object(value.as_object().unwrap());
        assert_eq!(raw.get("GSTIN"), Some("27AAAAA0000A1Z5"));
        assert_eq!(raw.get("Total"), Some("125000.5"));
        assert_eq!(raw.get("Paid"), Some("false"));
        assert_eq!(raw.get("Due Date"), Some(""));
        assert_eq!(raw.get("Refs"), Some(r#"["A","B"]"#));
    }

    #[test]
    fn test_record_pads_and_truncates_values() {
        let short = NormalizedRecord::new(schema(), vec!["Acme".into()], "a.pdf", None);
        assert_eq!(short.values(), &["Acme".to_string(), String::new()]);

        let long = NormalizedRecord::new(
            schema(),
            vec!["Acme".into(), "27A".into(), "extra".into()],
            "a.pdf",
            None,
        );
        assert_eq!(long.values().len(), 2);
    }

    #[test]
    fn test_record_serializes_in_column_order() {
        let record = NormalizedRecord::new(
            schema(),
            vec!["Acme".into(), "27A".into()],
            "a.pdf",
            None,
        );
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"Entity Name":"Acme","GSTIN":"27A","Source":"a.pdf"}"#);
        assert_eq!(record.get("Source"), Some("a.pdf"));
        assert_eq!(record.get("GSTIN"), Some("27A"));
        assert_eq!(record.get("Unknown"), None);
    }

    #[test]
    fn test_degraded_record_carries_error_column() {
        let record = NormalizedRecord::degraded(
            schema(),
            "broken.pdf",
            RecordError::new(RecordErrorKind::DocumentUnreadable, "not a PDF"),
        );
        assert!(record.is_blank());
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"Entity Name":"","GSTIN":"","Source":"broken.pdf","Error":"DocumentUnreadable: not a PDF"}"#
        );
    }
}
