//! Schema validation of parsed model output.
//!
//! Validation never stops at the first problem: every declared field is
//! checked, nested arrays and records included, and all violations are
//! reported together in schema declaration order. Undeclared fields of a
//! closed schema are reported last, in key order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

use crate::json::{type_name, ParsedJson};
use crate::record::{FieldValue, ValidatedRecord};
use crate::schema::{FieldKind, SchemaDescriptor};

/// Longest string excerpt quoted in a violation.
const EXCERPT_CHARS: usize = 40;

/// What went wrong with a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Required field absent
    Missing,
    /// Value has the wrong JSON type (including a disallowed `null`)
    WrongType,
    TooShort,
    TooLong,
    PatternMismatch,
    BelowMinimum,
    AboveMaximum,
    /// String outside the allowed enum values
    NotInEnum,
    TooFewItems,
    TooManyItems,
    /// Undeclared field in a closed schema
    UnknownField,
    /// The value being validated as a record is not a JSON object
    NotAnObject,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ViolationKind::Missing => "missing",
            ViolationKind::WrongType => "wrong type",
            ViolationKind::TooShort => "too short",
            ViolationKind::TooLong => "too long",
            ViolationKind::PatternMismatch => "pattern mismatch",
            ViolationKind::BelowMinimum => "below minimum",
            ViolationKind::AboveMaximum => "above maximum",
            ViolationKind::NotInEnum => "not an allowed value",
            ViolationKind::TooFewItems => "too few items",
            ViolationKind::TooManyItems => "too many items",
            ViolationKind::UnknownField => "unknown field",
            ViolationKind::NotAnObject => "not an object",
        };
        f.write_str(label)
    }
}

/// A single field-level problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Location, e.g. `severity` or `notes[2].summary`; `$` is the root
    pub path: String,
    pub kind: ViolationKind,
    /// The constraint that was expected to hold
    pub expected: String,
    /// What was actually found
    pub found: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (expected {}, found {})",
            self.path, self.kind, self.expected, self.found
        )
    }
}

/// Parsed JSON does not satisfy its schema.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{schema}: {} schema violation(s): {}", .violations.len(), summarize(.violations))]
pub struct ValidationError {
    pub schema: String,
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Violations at a given path.
    pub fn at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.violations.iter().filter(move |v| v.path == path)
    }

    /// Whether any violation has the given kind.
    pub fn has(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind == kind)
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validate parsed JSON against a schema descriptor.
///
/// Returns a record holding every declared field, or a [`ValidationError`]
/// listing every violation found.
pub fn validate(
    parsed: &ParsedJson,
    schema: &SchemaDescriptor,
) -> Result<ValidatedRecord, ValidationError> {
    let mut checker = Checker::default();
    let record = checker.check_record("", parsed, schema);

    match record {
        Some(record) if checker.violations.is_empty() => {
            tracing::debug!(schema = %schema.name, fields = record.len(), "Model output validated");
            Ok(record)
        }
        _ => {
            tracing::debug!(
                schema = %schema.name,
                violations = checker.violations.len(),
                "Model output failed schema validation"
            );
            Err(ValidationError {
                schema: schema.name.clone(),
                violations: checker.violations,
            })
        }
    }
}

#[derive(Default)]
struct Checker {
    violations: Vec<Violation>,
}

impl Checker {
    fn push(
        &mut self,
        path: &str,
        kind: ViolationKind,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) {
        self.violations.push(Violation {
            path: display_path(path),
            kind,
            expected: expected.into(),
            found: found.into(),
        });
    }

    /// Check an object against a descriptor. Returns the record only when
    /// this object contributed no violations.
    fn check_record(
        &mut self,
        path: &str,
        value: &Value,
        schema: &SchemaDescriptor,
    ) -> Option<ValidatedRecord> {
        let Value::Object(map) = value else {
            self.push(
                path,
                ViolationKind::NotAnObject,
                format!("{} object", schema.name),
                type_name(value),
            );
            return None;
        };

        let before = self.violations.len();
        let mut fields = Vec::with_capacity(schema.fields.len());

        for spec in &schema.fields {
            let field_path = join(path, &spec.name);
            match map.get(&spec.name) {
                None if spec.required => {
                    self.push(&field_path, ViolationKind::Missing, spec.kind.describe(), "nothing");
                }
                None => fields.push((spec.name.clone(), FieldValue::Null)),
                Some(Value::Null) if spec.accepts_null() => {
                    fields.push((spec.name.clone(), FieldValue::Null));
                }
                Some(Value::Null) => {
                    self.push(&field_path, ViolationKind::WrongType, spec.kind.describe(), "null");
                }
                Some(v) => {
                    if let Some(checked) = self.check_value(&field_path, v, &spec.kind) {
                        fields.push((spec.name.clone(), checked));
                    }
                }
            }
        }

        if schema.closed {
            self.check_unknown(path, map, schema);
        }

        if self.violations.len() == before {
            Some(ValidatedRecord::new(schema.name.clone(), fields))
        } else {
            None
        }
    }

    fn check_unknown(&mut self, path: &str, map: &Map<String, Value>, schema: &SchemaDescriptor) {
        // Key order even when serde_json preserves insertion order.
        let mut unknown: Vec<_> = map.iter().filter(|(key, _)| schema.get(key).is_none()).collect();
        unknown.sort_by(|a, b| a.0.cmp(b.0));
        for (key, value) in unknown {
            self.push(
                &join(path, key),
                ViolationKind::UnknownField,
                format!("only fields declared by {}", schema.name),
                type_name(value),
            );
        }
    }

    fn check_value(&mut self, path: &str, value: &Value, kind: &FieldKind) -> Option<FieldValue> {
        let before = self.violations.len();

        let checked = match kind {
            FieldKind::String {
                min_length,
                max_length,
                pattern,
            } => {
                let Some(s) = value.as_str() else {
                    return self.wrong_type(path, kind, value);
                };
                let len = s.chars().count();
                if let Some(min) = *min_length {
                    if len < min {
                        self.push(path, ViolationKind::TooShort, format!("at least {} chars", min), format!("{} chars", len));
                    }
                }
                if let Some(max) = *max_length {
                    if len > max {
                        self.push(path, ViolationKind::TooLong, format!("at most {} chars", max), format!("{} chars", len));
                    }
                }
                if let Some(p) = pattern {
                    if !p.is_match(s) {
                        self.push(path, ViolationKind::PatternMismatch, format!("match /{}/", p), excerpt(s));
                    }
                }
                FieldValue::Text(s.to_string())
            }

            FieldKind::Integer { minimum, maximum } => {
                let Some(i) = value.as_i64() else {
                    return self.wrong_type(path, kind, value);
                };
                self.check_range(path, i, minimum, maximum, i.to_string());
                FieldValue::Integer(i)
            }

            FieldKind::Number { minimum, maximum } => {
                let Value::Number(n) = value else {
                    return self.wrong_type(path, kind, value);
                };
                let f = n.as_f64().unwrap_or_default();
                self.check_range(path, f, minimum, maximum, n.to_string());
                FieldValue::Number(n.clone())
            }

            FieldKind::Boolean => {
                let Some(b) = value.as_bool() else {
                    return self.wrong_type(path, kind, value);
                };
                FieldValue::Boolean(b)
            }

            FieldKind::Enum { values } => {
                let Some(s) = value.as_str() else {
                    return self.wrong_type(path, kind, value);
                };
                if !values.iter().any(|v| v == s) {
                    self.push(path, ViolationKind::NotInEnum, kind.describe(), excerpt(s));
                }
                FieldValue::Enum(s.to_string())
            }

            FieldKind::Array {
                items,
                min_items,
                max_items,
            } => {
                let Some(elements) = value.as_array() else {
                    return self.wrong_type(path, kind, value);
                };
                let count = elements.len();
                if let Some(min) = *min_items {
                    if count < min {
                        self.push(path, ViolationKind::TooFewItems, format!("at least {} items", min), format!("{} items", count));
                    }
                }
                if let Some(max) = *max_items {
                    if count > max {
                        self.push(path, ViolationKind::TooManyItems, format!("at most {} items", max), format!("{} items", count));
                    }
                }

                let mut checked = Vec::with_capacity(count);
                for (index, element) in elements.iter().enumerate() {
                    let item_path = format!("{}[{}]", path, index);
                    if let Some(item) = self.check_value(&item_path, element, items) {
                        checked.push(item);
                    }
                }
                FieldValue::List(checked)
            }

            FieldKind::Object { schema } => {
                return self.check_record(path, value, schema).map(FieldValue::Record);
            }
        };

        (self.violations.len() == before).then_some(checked)
    }

    fn wrong_type(&mut self, path: &str, kind: &FieldKind, value: &Value) -> Option<FieldValue> {
        let found = match (kind, value) {
            (FieldKind::Integer { .. }, Value::Number(n)) if n.is_u64() && !n.is_i64() => {
                "integer out of range"
            }
            _ => type_name(value),
        };
        self.push(path, ViolationKind::WrongType, kind.describe(), found);
        None
    }

    fn check_range<T: PartialOrd + fmt::Display>(
        &mut self,
        path: &str,
        value: T,
        minimum: &Option<T>,
        maximum: &Option<T>,
        found: String,
    ) {
        if let Some(min) = minimum {
            if value < *min {
                self.push(path, ViolationKind::BelowMinimum, format!(">= {}", min), found.clone());
            }
        }
        if let Some(max) = maximum {
            if value > *max {
                self.push(path, ViolationKind::AboveMaximum, format!("<= {}", max), found);
            }
        }
    }

}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}

/// Quote a string, shortened to a readable excerpt.
fn excerpt(s: &str) -> String {
    if s.chars().count() <= EXCERPT_CHARS {
        format!("{:?}", s)
    } else {
        let head: String = s.chars().take(EXCERPT_CHARS).collect();
        format!("{:?}...", head)
    }
}
