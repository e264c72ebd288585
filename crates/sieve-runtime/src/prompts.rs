//! Prompts for the built-in structured tasks.
//!
//! In JSON-object mode the model never sees the schema itself, so every
//! prompt carries a [`field_guide`] describing the expected fields. The
//! word "JSON" must appear in the messages for the API to accept
//! `response_format: json_object`.

use sieve_core::{FieldKind, SchemaDescriptor};

/// Appended to each system prompt.
pub const JSON_ONLY_INSTRUCTION: &str =
    "Respond only with a single valid JSON object. Do not wrap it in code fences or add commentary.";

/// User message that triggers note generation.
pub const STUDY_NOTES_REQUEST: &str = "Generate the study notes.";

/// Natural-language description of `schema`, one line per field.
///
/// ```text
/// Return a JSON object with these fields:
/// - location (string, required): Geographic location of the alert
/// - expires_at (string or null, required): When the alert expires (if known)
/// ```
pub fn field_guide(schema: &SchemaDescriptor) -> String {
    let mut out = String::from("Return a JSON object with these fields:\n");
    write_fields(&mut out, schema, 0);
    if schema.closed {
        out.push_str("Do not include any other fields.\n");
    }
    out
}

fn write_fields(out: &mut String, schema: &SchemaDescriptor, depth: usize) {
    let indent = "  ".repeat(depth);
    for field in &schema.fields {
        let mut kind = field.kind.describe();
        if field.nullable {
            kind.push_str(" or null");
        }
        let presence = if field.required { "required" } else { "optional" };
        out.push_str(&format!("{}- {} ({}, {})", indent, field.name, kind, presence));
        if let Some(description) = &field.description {
            out.push_str(&format!(": {}", description));
        }
        out.push('\n');

        if let Some(nested) = nested_schema(&field.kind) {
            out.push_str(&format!("{}  each {} has:\n", indent, nested.name));
            write_fields(out, nested, depth + 2);
        }
    }
}

fn nested_schema(kind: &FieldKind) -> Option<&SchemaDescriptor> {
    match kind {
        FieldKind::Object { schema } => Some(schema),
        FieldKind::Array { items, .. } => nested_schema(items),
        _ => None,
    }
}

/// System prompt for a task: the guide plus the JSON-only instruction.
pub fn system_prompt(schema: &SchemaDescriptor) -> String {
    format!(
        "You produce structured data for software to consume.\n\n{}\n{}",
        field_guide(schema),
        JSON_ONLY_INSTRUCTION
    )
}

/// Weather alert request for a described situation.
pub fn weather_alert_prompt(situation: &str) -> String {
    format!(
        "Create a weather alert for {}. Return the response as a JSON object with fields: \
         location, severity, alert_type, description, advice, and expires_at.",
        situation.trim()
    )
}

/// Tech analysis request for a concept.
pub fn tech_analysis_prompt(concept: &str) -> String {
    format!(
        "Please analyze the concept of '{}'. Return the analysis as a JSON object.",
        concept.trim()
    )
}

/// System prompt embedding the source material for study notes.
pub fn study_notes_prompt(content: &str, count: usize) -> String {
    format!(
        "You are a study summarizer. Return exactly {count} unique notes that will help prepare \
         for the exam. Use the following content to create the notes:\n\n{content}\n\n\
         Respond only with valid JSON with this structure: \
         {{\"notes\": [{{\"id\": 1, \"heading\": \"Topic\", \"summary\": \"Brief explanation\", \"page_ref\": null}}]}}",
        count = count,
        content = content.trim(),
    )
}
