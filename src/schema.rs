//! Versioned field schemas for extracted notice records.
//!
//! A schema is an ordered list of column names. The pipeline asks the
//! extraction service for exactly these names and every output record carries
//! exactly these columns, in this order, followed by `Source`.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provenance column appended to every record. Never requested from the service.
pub const SOURCE_FIELD: &str = "Source";

/// Annotation column written by exporters when a record degraded.
pub const ERROR_FIELD: &str = "Error";

/// Schema used when no version is configured.
pub const DEFAULT_SCHEMA_VERSION: &str = "gst-litigation-v1";

const GST_LITIGATION_V1: &[&str] = &[
    "Entity Name",
    "GSTIN",
    "Type of Notice / Order (System Update)",
    "Description",
    "Ref ID",
    "Date Of Issuance",
    "Due Date",
    "Case ID",
    "Notice Type (ASMT-10 or ADT - 01 / SCN or Appeal)",
    "Financial Year",
    "Total Demand Amount as per Notice",
];

const GST_NOTICE_COMPACT_V1: &[&str] = &["Entity Name", "GSTIN", "Ref ID", "Due Date", "Tax Amount"];

/// Problems with a schema definition. Always run-fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown schema version: {0}")]
    UnknownVersion(String),

    #[error("Schema '{0}' has no fields")]
    Empty(String),

    #[error("Schema '{version}' has a blank field name at position {position}")]
    BlankField { version: String, position: usize },

    #[error("Schema '{version}' lists field '{field}' more than once")]
    DuplicateField { version: String, field: String },

    #[error("Schema '{version}' uses reserved field name '{field}'")]
    ReservedField { version: String, field: String },
}

/// An ordered, versioned list of field names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSchema {
    version: String,
    fields: Vec<String>,
}

impl FieldSchema {
    /// Build and validate a schema.
    pub fn new(
        version: impl Into<String>,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, SchemaError> {
        let schema = Self {
            version: version.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Look up one of the schemas compiled into the binary.
    pub fn builtin(version: &str) -> Option<Self> {
        let fields = match version {
            "gst-litigation-v1" => GST_LITIGATION_V1,
            "gst-notice-compact-v1" => GST_NOTICE_COMPACT_V1,
            _ => return None,
        };
        Some(Self {
            version: version.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        })
    }

    /// Versions of the built-in schemas.
    pub fn builtin_versions() -> &'static [&'static str] {
        &["gst-litigation-v1", "gst-notice-compact-v1"]
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Field names requested from the extraction service, in column order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// All output columns: the schema fields followed by `Source`.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(SOURCE_FIELD))
    }

    fn validate(&self) -> Result<(), SchemaError> {
        if self.fields.is_empty() {
            return Err(SchemaError::Empty(self.version.clone()));
        }
        let mut seen = std::collections::HashSet::new();
        for (position, field) in self.fields.iter().enumerate() {
            if field.trim().is_empty() {
                return Err(SchemaError::BlankField {
                    version: self.version.clone(),
                    position,
                });
            }
            if field.eq_ignore_ascii_case(SOURCE_FIELD) || field.eq_ignore_ascii_case(ERROR_FIELD) {
                return Err(SchemaError::ReservedField {
                    version: self.version.clone(),
                    field: field.clone(),
                });
            }
            if !seen.insert(field.as_str()) {
                return Err(SchemaError::DuplicateField {
                    version: self.version.clone(),
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }
}

/// A schema declared in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub fields: Vec<String>,
}

/// Built-in schemas plus any declared in configuration.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, Arc<FieldSchema>>,
}

impl SchemaRegistry {
    /// Registry with only the built-in schemas.
    pub fn builtin() -> Self {
        let schemas = FieldSchema::builtin_versions()
            .iter()
            .filter_map(|v| FieldSchema::builtin(v))
            .map(|s| (s.version.clone(), Arc::new(s)))
            .collect();
        Self { schemas }
    }

    /// Built-ins overlaid with custom definitions. A custom definition may
    /// shadow a built-in version.
    pub fn with_custom(custom: &BTreeMap<String, SchemaDefinition>) -> Result<Self, SchemaError> {
        let mut registry = Self::builtin();
        for (version, definition) in custom {
            let schema = FieldSchema::new(version.clone(), definition.fields.iter().cloned())?;
            registry.schemas.insert(version.clone(), Arc::new(schema));
        }
        Ok(registry)
    }

    /// Resolve a schema version for a run.
    pub fn resolve(&self, version: &str) -> Result<Arc<FieldSchema>, SchemaError> {
        self.schemas
            .get(version)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownVersion(version.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSchema> {
        self.schemas.values().map(|s| s.as_ref())
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
