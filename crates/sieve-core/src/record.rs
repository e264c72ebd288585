//! Validated records: parsed JSON that passed every schema check.

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Failure converting a validated record into a typed struct.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Record '{found}' cannot convert to '{expected}'")]
    SchemaMismatch { expected: String, found: String },

    #[error("Failed to convert record: {0}")]
    Conversion(String),
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Explicit `null`, or an optional field that was absent
    Null,
    Boolean(bool),
    Integer(i64),
    /// Kept as the parsed number so integral inputs are not widened
    Number(Number),
    Text(String),
    /// A string already checked against its allowed values
    Enum(String),
    List(Vec<FieldValue>),
    Record(ValidatedRecord),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// String content of a `Text` or `Enum` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) | FieldValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value of a `Number` or `Integer`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => n.as_f64(),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&ValidatedRecord> {
        match self {
            FieldValue::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Number(n) => Value::Number(n.clone()),
            FieldValue::Text(s) | FieldValue::Enum(s) => Value::String(s.clone()),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::Record(r) => r.to_json(),
        }
    }
}

/// Parsed JSON checked against a schema descriptor.
///
/// Holds exactly the declared fields, in declaration order. Required fields
/// are always present; absent optional fields hold [`FieldValue::Null`].
/// Undeclared fields of open schemas are not carried over.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRecord {
    schema: String,
    fields: Vec<(String, FieldValue)>,
}

impl ValidatedRecord {
    pub(crate) fn new(schema: impl Into<String>, fields: Vec<(String, FieldValue)>) -> Self {
        Self {
            schema: schema.into(),
            fields,
        }
    }

    /// Name of the descriptor this record was validated against.
    pub fn schema_name(&self) -> &str {
        &self.schema
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// String content of a text or enum field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_str)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FieldValue::as_i64)
    }

    pub fn list(&self, name: &str) -> Option<&[FieldValue]> {
        self.get(name).and_then(FieldValue::as_list)
    }

    /// Field names and values in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render back to JSON. Absent optional fields render as `null`.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    /// Convert into a typed struct through serde.
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, RecordError> {
        serde_json::from_value(self.to_json()).map_err(|e| RecordError::Conversion(e.to_string()))
    }
}

impl Serialize for ValidatedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
