//! Schema descriptors: the expected shape of a structured reply.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use super::SchemaError;

/// A regex the whole string must match, compiled once on construction.
///
/// A descriptor can only hold patterns that compile; a bad one fails when
/// the descriptor is built or loaded, never while validating a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Pattern {
    source: String,
    anchored: Regex,
}

impl Pattern {
    pub fn new(source: impl Into<String>) -> Result<Self, SchemaError> {
        let source = source.into();
        let invalid = |e: regex::Error| SchemaError::Invalid(format!("invalid pattern /{}/: {}", source, e));
        Regex::new(&source).map_err(invalid)?;
        let anchored = Regex::new(&format!("^(?:{})$", source)).map_err(invalid)?;
        Ok(Self { source, anchored })
    }

    /// The pattern as written, without anchors.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the whole of `s` matches.
    pub fn is_match(&self, s: &str) -> bool {
        self.anchored.is_match(s)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl TryFrom<String> for Pattern {
    type Error = SchemaError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Pattern::new(source)
    }
}

impl From<Pattern> for String {
    fn from(pattern: Pattern) -> Self {
        pattern.source
    }
}

/// Expected type and constraints of a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// UTF-8 string; lengths count Unicode scalar values
    String {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_length: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_length: Option<usize>,
        /// Regex the whole string must match
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pattern: Option<Pattern>,
    },

    /// Whole number representable as i64
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<i64>,
    },

    /// Any JSON number
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<f64>,
    },

    Boolean,

    /// String restricted to a fixed set of values (case-sensitive)
    Enum { values: Vec<String> },

    /// Homogeneous array
    Array {
        items: Box<FieldKind>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min_items: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_items: Option<usize>,
    },

    /// Nested record
    Object { schema: Box<SchemaDescriptor> },
}

impl FieldKind {
    /// Unconstrained string.
    pub fn text() -> Self {
        FieldKind::String {
            min_length: None,
            max_length: None,
            pattern: None,
        }
    }

    /// String of at most `max` characters.
    pub fn text_up_to(max: usize) -> Self {
        FieldKind::String {
            min_length: None,
            max_length: Some(max),
            pattern: None,
        }
    }

    /// String matching `pattern` in full.
    pub fn matching(pattern: Pattern) -> Self {
        FieldKind::String {
            min_length: None,
            max_length: None,
            pattern: Some(pattern),
        }
    }

    /// Unconstrained integer.
    pub fn integer() -> Self {
        FieldKind::Integer {
            minimum: None,
            maximum: None,
        }
    }

    /// Integer within `min..=max`.
    pub fn integer_between(min: i64, max: i64) -> Self {
        FieldKind::Integer {
            minimum: Some(min),
            maximum: Some(max),
        }
    }

    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        FieldKind::Enum {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Unbounded array of `items`.
    pub fn list_of(items: FieldKind) -> Self {
        FieldKind::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        }
    }

    pub fn record(schema: SchemaDescriptor) -> Self {
        FieldKind::Object {
            schema: Box::new(schema),
        }
    }

    /// JSON type name this kind expects.
    pub fn json_type(&self) -> &'static str {
        match self {
            FieldKind::String { .. } | FieldKind::Enum { .. } => "string",
            FieldKind::Integer { .. } => "integer",
            FieldKind::Number { .. } => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Array { .. } => "array",
            FieldKind::Object { .. } => "object",
        }
    }

    /// Short human description, e.g. `string (max 150 chars)`.
    pub fn describe(&self) -> String {
        match self {
            FieldKind::String {
                min_length,
                max_length,
                pattern,
            } => {
                let mut parts = Vec::new();
                if let Some(min) = min_length {
                    parts.push(format!("min {} chars", min));
                }
                if let Some(max) = max_length {
                    parts.push(format!("max {} chars", max));
                }
                if let Some(p) = pattern {
                    parts.push(format!("matching /{}/", p));
                }
                with_details("string", &parts)
            }
            FieldKind::Integer { minimum, maximum } => {
                with_details("integer", &range_parts(minimum, maximum))
            }
            FieldKind::Number { minimum, maximum } => {
                with_details("number", &range_parts(minimum, maximum))
            }
            FieldKind::Boolean => "boolean".to_string(),
            FieldKind::Enum { values } => format!("one of: {}", values.join(", ")),
            FieldKind::Array {
                items,
                min_items,
                max_items,
            } => {
                let mut parts = Vec::new();
                if let Some(min) = min_items {
                    parts.push(format!("min {} items", min));
                }
                if let Some(max) = max_items {
                    parts.push(format!("max {} items", max));
                }
                with_details(&format!("array of {}", items.describe()), &parts)
            }
            FieldKind::Object { schema } => format!("{} object", schema.name),
        }
    }
}

fn range_parts<T: std::fmt::Display>(minimum: &Option<T>, maximum: &Option<T>) -> Vec<String> {
    match (minimum, maximum) {
        (Some(min), Some(max)) => vec![format!("{} to {}", min, max)],
        (Some(min), None) => vec![format!(">= {}", min)],
        (None, Some(max)) => vec![format!("<= {}", max)],
        (None, None) => Vec::new(),
    }
}

fn with_details(base: &str, parts: &[String]) -> String {
    if parts.is_empty() {
        base.to_string()
    } else {
        format!("{} ({})", base, parts.join(", "))
    }
}

fn default_true() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A single declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,

    #[serde(flatten)]
    pub kind: FieldKind,

    /// Field must be present in the object
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub required: bool,

    /// `null` is an acceptable value
    #[serde(default, skip_serializing_if = "is_false")]
    pub nullable: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    /// A required, non-nullable field.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            nullable: false,
            description: None,
        }
    }

    /// Field may be omitted (an omitted or `null` value reads as absent).
    pub fn optional(mut self) -> Self {
        self.required = false;
        self.nullable = true;
        self
    }

    /// Field must be present but may be `null`.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Whether an explicit `null` is accepted for this field.
    pub fn accepts_null(&self) -> bool {
        self.nullable || !self.required
    }
}

/// Fixed description of the record shape expected from a model reply.
///
/// Field order is significant: violations are reported in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub fields: Vec<FieldSpec>,

    /// Unrecognized fields are violations
    #[serde(default, skip_serializing_if = "is_false")]
    pub closed: bool,
}

impl SchemaDescriptor {
    /// Start an open descriptor with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
            closed: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Reject fields that are not declared.
    pub fn closed(mut self) -> Self {
        self.closed = true;
        self
    }

    /// Look up a declared field by name.
    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Parse a descriptor from a YAML string.
    ///
    /// Keys the descriptor format does not define are rejected rather than
    /// ignored, so a misspelled constraint cannot silently disappear.
    pub fn from_yaml(yaml: &str) -> Result<Self, SchemaError> {
        let tree: serde_json::Value = serde_yaml::from_str(yaml)?;
        reject_unknown_keys(&tree)?;
        let descriptor: SchemaDescriptor = serde_yaml::from_str(yaml)?;
        descriptor.check()?;
        Ok(descriptor)
    }

    /// Parse a descriptor from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let tree: serde_json::Value = serde_json::from_str(json)?;
        reject_unknown_keys(&tree)?;
        let descriptor: SchemaDescriptor = serde_json::from_value(tree)?;
        descriptor.check()?;
        Ok(descriptor)
    }

    /// Load a descriptor file; `.json` files are read as JSON, anything else
    /// as YAML.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    /// Check the descriptor is internally consistent.
    pub fn check(&self) -> Result<(), SchemaError> {
        if self.name.trim().is_empty() {
            return Err(SchemaError::Invalid("schema name is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(SchemaError::Invalid(format!(
                    "{}: field with empty name",
                    self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::Invalid(format!(
                    "{}: duplicate field '{}'",
                    self.name, field.name
                )));
            }
            check_kind(&format!("{}.{}", self.name, field.name), &field.kind)?;
        }

        Ok(())
    }
}

const DESCRIPTOR_KEYS: &[&str] = &["name", "description", "fields", "closed"];
const FIELD_KEYS: &[&str] = &["name", "type", "required", "nullable", "description"];

/// Constraint keys allowed next to each `type` tag.
fn constraint_keys(type_tag: &str) -> Option<&'static [&'static str]> {
    let keys: &'static [&'static str] = match type_tag {
        "string" => &["min_length", "max_length", "pattern"],
        "integer" | "number" => &["minimum", "maximum"],
        "boolean" => &[],
        "enum" => &["values"],
        "array" => &["items", "min_items", "max_items"],
        "object" => &["schema"],
        _ => return None,
    };
    Some(keys)
}

/// Walk a raw descriptor tree and fail on the first key the format does not
/// define. Shape and type errors are left to serde.
fn reject_unknown_keys(tree: &serde_json::Value) -> Result<(), SchemaError> {
    let Some(map) = tree.as_object() else {
        return Ok(());
    };
    let name = map.get("name").and_then(|n| n.as_str()).unwrap_or("schema");
    reject_keys(name, map, DESCRIPTOR_KEYS, &[])?;

    let fields = map.get("fields").and_then(|f| f.as_array());
    for field in fields.into_iter().flatten() {
        let Some(field_map) = field.as_object() else {
            continue;
        };
        let at = match field_map.get("name").and_then(|n| n.as_str()) {
            Some(field_name) => format!("{}.{}", name, field_name),
            None => name.to_string(),
        };
        check_kind_keys(&at, field_map, FIELD_KEYS)?;
    }
    Ok(())
}

fn check_kind_keys(
    at: &str,
    map: &serde_json::Map<String, serde_json::Value>,
    base: &[&str],
) -> Result<(), SchemaError> {
    let Some(constraints) = map
        .get("type")
        .and_then(|t| t.as_str())
        .and_then(constraint_keys)
    else {
        return Ok(());
    };
    reject_keys(at, map, base, constraints)?;

    if let Some(items) = map.get("items").and_then(|i| i.as_object()) {
        check_kind_keys(&format!("{}[]", at), items, &["type"])?;
    }
    if let Some(schema) = map.get("schema") {
        reject_unknown_keys(schema)?;
    }
    Ok(())
}

fn reject_keys(
    at: &str,
    map: &serde_json::Map<String, serde_json::Value>,
    base: &[&str],
    constraints: &[&str],
) -> Result<(), SchemaError> {
    match map
        .keys()
        .find(|key| !base.contains(&key.as_str()) && !constraints.contains(&key.as_str()))
    {
        Some(key) => Err(SchemaError::Invalid(format!("{}: unknown key '{}'", at, key))),
        None => Ok(()),
    }
}

fn check_kind(at: &str, kind: &FieldKind) -> Result<(), SchemaError> {
    match kind {
        FieldKind::String {
            min_length,
            max_length,
            ..
        } => check_bounds(at, min_length, max_length)?,
        FieldKind::Integer { minimum, maximum } => check_bounds(at, minimum, maximum)?,
        FieldKind::Number { minimum, maximum } => {
            if minimum.is_some_and(|m| !m.is_finite()) || maximum.is_some_and(|m| !m.is_finite())
            {
                return Err(SchemaError::Invalid(format!("{}: non-finite bound", at)));
            }
            check_bounds(at, minimum, maximum)?;
        }
        FieldKind::Boolean => {}
        FieldKind::Enum { values } => {
            if values.is_empty() {
                return Err(SchemaError::Invalid(format!("{}: enum has no values", at)));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = values.iter().find(|v| !seen.insert(v.as_str())) {
                return Err(SchemaError::Invalid(format!(
                    "{}: duplicate enum value '{}'",
                    at, dup
                )));
            }
        }
        FieldKind::Array {
            items,
            min_items,
            max_items,
        } => {
            check_bounds(at, min_items, max_items)?;
            check_kind(&format!("{}[]", at), items)?;
        }
        FieldKind::Object { schema } => schema.check()?,
    }
    Ok(())
}

fn check_bounds<T: PartialOrd + std::fmt::Display>(
    at: &str,
    min: &Option<T>,
    max: &Option<T>,
) -> Result<(), SchemaError> {
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(SchemaError::Invalid(format!(
                "{}: minimum {} exceeds maximum {}",
                at, min, max
            )));
        }
    }
    Ok(())
}
