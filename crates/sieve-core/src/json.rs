//! Strict JSON parsing of raw model output.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dynamically-typed JSON tree obtained from raw model output.
pub type ParsedJson = serde_json::Value;

/// Broad class of a parse failure, as reported by the JSON parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseCategory {
    /// Malformed JSON (unexpected character, trailing characters, ...)
    Syntax,
    /// Input ended before a complete value was read
    Eof,
    /// Well-formed but semantically unreadable (e.g. number out of range)
    Data,
    /// Failure reading the underlying input
    Io,
}

impl From<serde_json::error::Category> for ParseCategory {
    fn from(category: serde_json::error::Category) -> Self {
        match category {
            serde_json::error::Category::Syntax => ParseCategory::Syntax,
            serde_json::error::Category::Eof => ParseCategory::Eof,
            serde_json::error::Category::Data => ParseCategory::Data,
            serde_json::error::Category::Io => ParseCategory::Io,
        }
    }
}

/// Raw text is not syntactically valid JSON.
///
/// Positions are 1-based, as reported by the parser. A failure before any
/// input was consumed reports line 1 column 0.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("invalid JSON at line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub category: ParseCategory,
    pub message: String,
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        Self {
            line: err.line().max(1),
            column: err.column(),
            category: err.classify().into(),
            message: strip_position(&err.to_string()),
        }
    }
}

/// serde_json appends " at line X column Y" to its messages; the position is
/// kept in dedicated fields instead.
fn strip_position(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(idx) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

/// Parse raw model output as strict JSON.
///
/// No leniency is applied: Markdown code fences, comments, trailing commas
/// and trailing text all fail.
pub fn parse_json(raw: &str) -> Result<ParsedJson, ParseError> {
    serde_json::from_str(raw).map_err(|e| {
        let err = ParseError::from(e);
        tracing::debug!(line = err.line, column = err.column, "Model output is not valid JSON");
        err
    })
}

/// Name of the JSON type of a value, as used in violation reports.
pub fn type_name(value: &ParsedJson) -> &'static str {
    match value {
        ParsedJson::Null => "null",
        ParsedJson::Bool(_) => "boolean",
        ParsedJson::Number(n) if n.is_i64() || n.is_u64() => "integer",
        ParsedJson::Number(_) => "number",
        ParsedJson::String(_) => "string",
        ParsedJson::Array(_) => "array",
        ParsedJson::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_object() {
        let value = parse_json(r#"{"location": "Chicago", "severity": "high"}"#).unwrap();
        assert_eq!(value["location"], "Chicago");
    }

    #[test]
    fn test_parse_surrounding_whitespace() {
        assert!(parse_json("  \n {\"a\": 1}\n\t").is_ok());
    }

    #[test]
    fn test_unterminated_object() {
        let err = parse_json("{not json").unwrap_err();
        assert_eq!(err.category, ParseCategory::Syntax);
        assert_eq!(err.line, 1);
        assert!(err.column > 0);
        assert!(!err.message.contains(" at line "));
    }

    #[test]
    fn test_empty_input_is_eof() {
        let err = parse_json("   ").unwrap_err();
        assert_eq!(err.category, ParseCategory::Eof);
    }

    #[test]
    fn test_code_fence_rejected() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert!(parse_json(raw).is_err());
    }

    #[test]
    fn test_trailing_text_rejected() {
        let err = parse_json(r#"{"a": 1} and some commentary"#).unwrap_err();
        assert_eq!(err.category, ParseCategory::Syntax);
    }

    #[test]
    fn test_error_reports_line() {
        let err = parse_json("{\n  \"a\": 1,\n  \"b\": \n}").unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.to_string().contains("line 4"));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(&serde_json::json!(3)), "integer");
        assert_eq!(type_name(&serde_json::json!(3.5)), "number");
        assert_eq!(type_name(&serde_json::json!(null)), "null");
        assert_eq!(type_name(&serde_json::json!([])), "array");
        assert_eq!(type_name(&serde_json::json!(true)), "boolean");
    }
}
