//! Schema descriptors and the built-in catalog.
//!
//! A descriptor lists the fields a model reply must contain, with their
//! types and constraints. Descriptors are either built in code (see
//! [`catalog`]) or loaded from YAML/JSON files, and can be rendered as JSON
//! Schema for strict structured-output requests.

pub mod catalog;
mod descriptor;
mod export;

pub use descriptor::{FieldKind, FieldSpec, Pattern, SchemaDescriptor};

use thiserror::Error;

/// Errors from loading, checking or exporting descriptors.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to read schema file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid schema: {0}")]
    Invalid(String),

    #[error("Failed to compile JSON Schema: {0}")]
    Compile(String),

    #[error("Unknown schema: {0}")]
    Unknown(String),
}

/// Resolve a descriptor from a built-in name or a file path.
///
/// Names in the built-in catalog win; anything else is read as a file.
pub fn resolve(name_or_path: &str) -> Result<SchemaDescriptor, SchemaError> {
    if let Some(schema) = catalog::lookup(name_or_path) {
        return Ok(schema.clone());
    }
    let path = std::path::Path::new(name_or_path);
    if path.exists() {
        return SchemaDescriptor::from_file(path);
    }
    Err(SchemaError::Unknown(format!(
        "'{}' (built-in schemas: {})",
        name_or_path,
        catalog::names().join(", ")
    )))
}
