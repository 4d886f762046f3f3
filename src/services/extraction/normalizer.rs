//! Projection of raw service output onto a field schema.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{NormalizedRecord, RawExtraction, RecordError};
use crate::schema::FieldSchema;

/// Build the schema-conformant record for one document.
///
/// Each schema field takes the raw value under the exact field name, falling
/// back to a key that differs only in case, spacing or punctuation. Values are
/// copied unmodified; keys matching no field are dropped. `Source` is always
/// the supplied filename.
pub fn normalize(raw: &RawExtraction, source: &str, schema: &Arc<FieldSchema>) -> NormalizedRecord {
    let mut folded: HashMap<String, &str> = HashMap::with_capacity(raw.len());
    for (key, value) in raw.iter() {
        folded.entry(fold_key(key)).or_insert(value);
    }

    let values = schema
        .fields()
        .iter()
        .map(|field| {
            raw.get(field)
                .or_else(|| folded.get(&fold_key(field)).copied())
                .unwrap_or_default()
                .to_string()
        })
        .collect();

    NormalizedRecord::new(Arc::clone(schema), values, source, None)
}

/// All-empty record for a document that could not be processed.
pub fn normalize_failed(
    source: &str,
    schema: &Arc<FieldSchema>,
    error: RecordError,
) -> NormalizedRecord {
    NormalizedRecord::degraded(Arc::clone(schema), source, error)
}

/// Lowercased alphanumerics only, so `Ref ID`, `ref_id` and `REF-ID` agree.
fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
