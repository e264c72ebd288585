//! # sieve-core
//!
//! Deterministic validation of structured output from language models.
//!
//! A model asked for JSON can fail in two ways: the reply is not JSON at
//! all, or it is JSON of the wrong shape. This crate keeps the two apart:
//!
//! 1. [`parse_json`] turns raw text into a [`ParsedJson`] tree or a
//!    [`ParseError`] with the position of the failure.
//! 2. [`validate`] checks that tree against a [`SchemaDescriptor`] and returns
//!    a [`ValidatedRecord`] or a [`ValidationError`] listing *every*
//!    violation, in schema declaration order.
//!
//! ## Key Guarantees
//!
//! 1. **No network**: nothing here talks to a model
//! 2. **No panics on input**: every failure is a returned error
//! 3. **Complete reports**: one call reports all violations
//! 4. **Stateless**: calls are independent and safe to run in parallel
//!
//! ## Example
//!
//! ```rust,ignore
//! use sieve_core::{catalog, parse_and_validate, ResponseError};
//!
//! match parse_and_validate(raw, catalog::weather_alert()) {
//!     Ok(record) => println!("severity: {}", record.text("severity").unwrap_or("?")),
//!     Err(ResponseError::Parse(e)) => println!("not JSON: {}", e),
//!     Err(ResponseError::Validation(e)) => {
//!         for v in &e.violations {
//!             println!("{}", v);
//!         }
//!     }
//!     Err(e) => println!("{}", e),
//! }
//! ```

pub mod json;
pub mod models;
pub mod outcome;
pub mod record;
pub mod schema;
pub mod validator;

// Re-export main types at crate root
pub use json::{parse_json, ParseCategory, ParseError, ParsedJson};
pub use models::{
    DifficultyLevel, Note, NoteCollection, Severity, StructuredRecord, TechAnalysis, WeatherAlert,
};
pub use outcome::{DegradePolicy, Outcome};
pub use record::{FieldValue, RecordError, ValidatedRecord};
pub use schema::{catalog, FieldKind, FieldSpec, Pattern, SchemaDescriptor, SchemaError};
pub use validator::{validate, ValidationError, Violation, ViolationKind};

use thiserror::Error;

/// Why a raw reply did not produce a record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    /// Not JSON; re-prompt or treat the reply as free text
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// JSON of the wrong shape
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Validated, but the typed struct disagrees with its descriptor
    #[error(transparent)]
    Record(#[from] RecordError),
}

impl ResponseError {
    pub fn is_parse(&self) -> bool {
        matches!(self, ResponseError::Parse(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ResponseError::Validation(_))
    }

    /// Schema violations, if this is a validation failure.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ResponseError::Validation(e) => &e.violations,
            _ => &[],
        }
    }
}

/// Parse raw model output and validate it against `schema`.
///
/// Validation is skipped when the text is not JSON.
pub fn parse_and_validate(
    raw: &str,
    schema: &SchemaDescriptor,
) -> Result<ValidatedRecord, ResponseError> {
    let parsed = parse_json(raw)?;
    Ok(validate(&parsed, schema)?)
}

/// Parse, validate and convert raw model output into a typed record.
pub fn parse_as<T: StructuredRecord>(raw: &str) -> Result<T, ResponseError> {
    let record = parse_and_validate(raw, T::schema())?;
    Ok(T::from_record(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALERT: &str = r#"{
        "location": "Chicago",
        "severity": "high",
        "alert_type": "Severe Thunderstorm Warning",
        "description": "A line of storms with 70 mph gusts is moving east.",
        "advice": "Move to an interior room on the lowest floor.",
        "expires_at": "9:00 PM CDT"
    }"#;

    #[test]
    fn test_parse_and_validate_alert() {
        let record = parse_and_validate(ALERT, catalog::weather_alert()).unwrap();
        assert_eq!(record.text("location"), Some("Chicago"));
        assert_eq!(record.text("expires_at"), Some("9:00 PM CDT"));
    }

    #[test]
    fn test_parse_failure_short_circuits() {
        let err = parse_and_validate("{not json", catalog::weather_alert()).unwrap_err();
        assert!(err.is_parse());
        assert!(err.violations().is_empty());
    }

    #[test]
    fn test_validation_failure_reports_all() {
        let raw = r#"{"location": "Chicago", "severity": "apocalyptic"}"#;
        let err = parse_and_validate(raw, catalog::weather_alert()).unwrap_err();
        assert!(err.is_validation());
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            ["severity", "alert_type", "description", "advice", "expires_at"]
        );
        assert_eq!(err.violations()[0].kind, ViolationKind::NotInEnum);
    }

    #[test]
    fn test_parse_as_typed() {
        let alert: WeatherAlert = parse_as(ALERT).unwrap();
        assert_eq!(alert.severity, Severity::High);

        let raw = r#"{
            "concept": "Async/Await in Python",
            "difficulty_level": "Intermediate",
            "key_benefits": ["Concurrency without threads"],
            "common_pitfalls": ["Calling blocking functions in a coroutine"],
            "use_cases": ["HTTP clients", "Chat servers"],
            "learning_resources": ["Python asyncio documentation"]
        }"#;
        let analysis: TechAnalysis = parse_as(raw).unwrap();
        assert_eq!(analysis.difficulty_level, DifficultyLevel::Intermediate);
        assert_eq!(analysis.use_cases.len(), 2);
    }

    #[test]
    fn test_parse_as_rejects_invalid() {
        let result = parse_as::<Note>(r#"{"id": 0, "heading": "h", "summary": "s"}"#);
        assert!(matches!(result, Err(ResponseError::Validation(_))));
    }

    #[test]
    fn test_response_error_display_is_transparent() {
        let err = parse_and_validate("[", catalog::note()).unwrap_err();
        assert!(err.to_string().starts_with("invalid JSON at line 1"));
    }

    proptest! {
        #[test]
        fn prop_parse_and_validate_is_idempotent(raw in "\\PC{0,64}") {
            let first = parse_and_validate(&raw, catalog::note());
            let second = parse_and_validate(&raw, catalog::note());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_idempotent_on_json_objects(
            id in proptest::option::of(-5i64..20),
            heading in proptest::option::of("[a-z]{0,8}"),
            extra in proptest::option::of(any::<bool>()),
        ) {
            let mut value = serde_json::Map::new();
            if let Some(id) = id {
                value.insert("id".into(), id.into());
            }
            if let Some(heading) = heading {
                value.insert("heading".into(), heading.into());
            }
            if let Some(extra) = extra {
                value.insert("extra".into(), extra.into());
            }
            let raw = serde_json::Value::Object(value).to_string();
            let first = parse_and_validate(&raw, catalog::note());
            let second = parse_and_validate(&raw, catalog::note());
            prop_assert_eq!(first, second);
        }
    }
}
