//! Command implementations

pub mod generate;
pub mod schemas;
pub mod validate;

/// Pretty-printed JSON, falling back to the compact form.
pub(crate) fn pretty(value: &serde_json::Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
