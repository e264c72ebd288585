//! `sieve validate`: check raw output read from a file or stdin.

use anyhow::Context;
use serde_json::json;
use sieve_core::schema::resolve;
use sieve_core::{DegradePolicy, Outcome, ResponseError, SchemaDescriptor};
use std::io::Read;
use std::process::ExitCode;

use super::pretty;
use crate::cli::ValidateArgs;

/// Exit status for output that is JSON but violates the schema.
pub const EXIT_INVALID: u8 = 1;
/// Exit status for output that is not JSON.
pub const EXIT_NOT_JSON: u8 = 2;

/// What to print for one validation.
#[derive(Debug)]
pub struct Report {
    pub stdout: String,
    /// Printed to stderr, one per line
    pub warnings: Vec<String>,
    pub exit: u8,
}

pub fn run(args: &ValidateArgs) -> anyhow::Result<ExitCode> {
    let schema = load_schema(args)?;
    let raw = read_input(args)?;
    tracing::debug!(schema = %schema.name, bytes = raw.len(), "Validating input");

    let report = check(&raw, &schema, args.degrade, args.json);
    for warning in &report.warnings {
        eprintln!("warning: {}", warning);
    }
    println!("{}", report.stdout);
    Ok(ExitCode::from(report.exit))
}

fn load_schema(args: &ValidateArgs) -> anyhow::Result<SchemaDescriptor> {
    if let Some(path) = &args.schema_file {
        return SchemaDescriptor::from_file(path)
            .with_context(|| format!("failed to load descriptor {}", path.display()));
    }
    let name = args
        .schema
        .as_deref()
        .context("either --schema or --schema-file is required")?;
    Ok(resolve(name)?)
}

fn read_input(args: &ValidateArgs) -> anyhow::Result<String> {
    match &args.input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("failed to read stdin")?;
            Ok(raw)
        }
    }
}

/// Validate `raw` and build the report.
pub fn check(raw: &str, schema: &SchemaDescriptor, degrade: bool, as_json: bool) -> Report {
    let policy = if degrade {
        DegradePolicy::Degrade
    } else {
        DegradePolicy::Strict
    };
    let name = schema.name.as_str();

    match Outcome::assess(raw, schema, policy) {
        Ok(Outcome::Validated(record)) => Report {
            stdout: if as_json {
                pretty(&json!({ "status": "validated", "schema": name, "record": record }))
            } else {
                format!("valid {} ({} fields)\n{}", name, record.len(), pretty(&record.to_json()))
            },
            warnings: Vec::new(),
            exit: 0,
        },
        Ok(Outcome::Degraded { data, error }) => Report {
            stdout: if as_json {
                pretty(&json!({
                    "status": "degraded",
                    "schema": name,
                    "data": data,
                    "violations": error.violations,
                }))
            } else {
                pretty(&data)
            },
            warnings: error.violations.iter().map(|v| v.to_string()).collect(),
            exit: 0,
        },
        Ok(Outcome::Unstructured { raw, error }) => Report {
            stdout: if as_json {
                pretty(&json!({ "status": "unstructured", "schema": name, "raw": raw, "error": error }))
            } else {
                raw
            },
            warnings: vec![error.to_string()],
            exit: 0,
        },
        Err(ResponseError::Parse(error)) => Report {
            stdout: if as_json {
                pretty(&json!({ "status": "not_json", "schema": name, "error": error }))
            } else {
                format!("not JSON: {}", error)
            },
            warnings: Vec::new(),
            exit: EXIT_NOT_JSON,
        },
        Err(ResponseError::Validation(error)) => Report {
            stdout: if as_json {
                pretty(&json!({ "status": "invalid", "schema": name, "violations": error.violations }))
            } else {
                let mut out = format!(
                    "invalid {}: {} violation(s)",
                    name,
                    error.violations.len()
                );
                for violation in &error.violations {
                    out.push_str(&format!("\n  - {}", violation));
                }
                out
            },
            warnings: Vec::new(),
            exit: EXIT_INVALID,
        },
        Err(other) => Report {
            stdout: other.to_string(),
            warnings: Vec::new(),
            exit: EXIT_INVALID,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_core::schema::catalog;

    fn args(schema: Option<&str>) -> ValidateArgs {
        ValidateArgs {
            schema: schema.map(str::to_string),
            schema_file: None,
            input: None,
            degrade: false,
            json: false,
        }
    }

    #[test]
    fn test_load_builtin_schema() {
        let schema = load_schema(&args(Some("tech_analysis"))).unwrap();
        assert_eq!(schema.name, "tech_analysis");
    }

    #[test]
    fn test_load_unknown_schema_lists_builtins() {
        let err = load_schema(&args(Some("horoscope"))).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("horoscope"));
        assert!(message.contains("note_collection"));

        assert!(load_schema(&args(None)).is_err());
    }

    const ALERT: &str = r#"{"location": "Chicago", "severity": "high", "alert_type": "Flood Watch",
        "description": "Heavy rain.", "advice": "Avoid low roads.", "expires_at": null}"#;

    #[test]
    fn test_valid_input_exits_zero() {
        let report = check(ALERT, catalog::weather_alert(), false, false);
        assert_eq!(report.exit, 0);
        assert!(report.stdout.starts_with("valid weather_alert (6 fields)"));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_invalid_input_lists_violations() {
        let report = check(
            r#"{"location": "Chicago", "severity": "apocalyptic"}"#,
            catalog::weather_alert(),
            false,
            false,
        );
        assert_eq!(report.exit, EXIT_INVALID);
        assert!(report.stdout.starts_with("invalid weather_alert: 5 violation(s)"));
        assert_eq!(report.stdout.lines().count(), 6);
    }

    #[test]
    fn test_not_json_exits_two() {
        let report = check("{not json", catalog::note(), false, true);
        assert_eq!(report.exit, EXIT_NOT_JSON);
        let json: serde_json::Value = serde_json::from_str(&report.stdout).unwrap();
        assert_eq!(json["status"], "not_json");
        assert_eq!(json["error"]["line"], 1);
    }

    #[test]
    fn test_degrade_warns_and_succeeds() {
        let report = check(r#"{"id": 11, "heading": "Limits"}"#, catalog::note(), true, true);
        assert_eq!(report.exit, 0);
        assert_eq!(report.warnings.len(), 2);
        let json: serde_json::Value = serde_json::from_str(&report.stdout).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["data"]["heading"], "Limits");
        assert_eq!(json["violations"][0]["path"], "id");
    }

    #[test]
    fn test_degrade_keeps_prose() {
        let report = check("It will rain.", catalog::weather_alert(), true, false);
        assert_eq!(report.exit, 0);
        assert_eq!(report.stdout, "It will rain.");
        assert_eq!(report.warnings.len(), 1);
    }
}
