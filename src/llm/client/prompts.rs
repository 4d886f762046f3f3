//! Default prompt templates for notice field extraction.

/// Default prompt for one document. Placeholders: `{fields}`, `{content}`.
pub const DEFAULT_SINGLE_PROMPT: &str = r#"You are an AI that extracts GST litigation notice details.

Extract the following fields from the text below.
If a field is not present, leave it blank. Do not guess or invent values.

Fields:
{fields}

Return ONLY a JSON object with exactly these keys and string values. No commentary.

Text:
{content}"#;

/// Default prompt for several documents in one call. Placeholders: `{fields}`, `{documents}`.
pub const DEFAULT_BATCH_PROMPT: &str = r#"You are an AI that extracts GST litigation notice details.

Below is a JSON array of documents, each with a "source" file name and its "text".
For EACH document, extract the following fields. If a field is not present in
that document, leave it blank. Do not guess or invent values.

Fields:
{fields}

Return ONLY a JSON array with one object per document, in the same order as the
input, each object having exactly these keys and string values. No commentary.

Documents:
{documents}"#;

/// Render field names as the bullet list embedded in prompts.
pub fn field_list(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| format!("- {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}
