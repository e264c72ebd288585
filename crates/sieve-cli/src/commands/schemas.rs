//! `sieve schemas` and `sieve schema`.

use anyhow::Context;
use sieve_core::schema::{catalog, resolve};

/// One line per built-in descriptor.
pub fn list() -> Vec<String> {
    catalog::names()
        .iter()
        .filter_map(|name| catalog::lookup(name))
        .map(|schema| {
            format!(
                "{:<16} {:>2} fields{}  {}",
                schema.name,
                schema.fields.len(),
                if schema.closed { ", closed" } else { "" },
                schema.description.as_deref().unwrap_or("")
            )
        })
        .collect()
}

/// Pretty JSON Schema for `name`, compiled before it is returned.
pub fn export(name: &str, strict: bool) -> anyhow::Result<String> {
    let schema = resolve(name)?;
    schema
        .compile_json_schema(strict)
        .with_context(|| format!("exported schema for '{}' does not compile", schema.name))?;
    tracing::debug!(schema = %schema.name, strict, "Exporting JSON Schema");
    Ok(serde_json::to_string_pretty(&schema.to_json_schema(strict))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_names_every_builtin() {
        let lines = list();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("weather_alert"));
        assert!(lines[1].contains("6 fields, closed"));
    }

    #[test]
    fn test_export_strict_note() {
        let json: serde_json::Value = serde_json::from_str(&export("note", true).unwrap()).unwrap();
        assert_eq!(json["title"], "note");
        assert_eq!(json["additionalProperties"], false);
    }

    #[test]
    fn test_export_unknown_schema() {
        let err = export("no_such_schema", false).unwrap_err();
        assert!(err.to_string().contains("no_such_schema"));
    }
}
