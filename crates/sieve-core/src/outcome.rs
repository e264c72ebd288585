//! Caller-selected handling of replies that fail validation.
//!
//! By default every failure is an error. A caller that prefers to keep
//! whatever the model produced opts into [`DegradePolicy::Degrade`]; the
//! degraded outcome still carries the complete error.

use serde::{Deserialize, Serialize};

use crate::json::{ParseError, ParsedJson};
use crate::record::ValidatedRecord;
use crate::schema::SchemaDescriptor;
use crate::validator::{validate, ValidationError};
use crate::{parse_json, ResponseError};

/// What to do with a reply that does not validate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradePolicy {
    /// Parse and validation failures are errors
    #[default]
    Strict,
    /// Keep unvalidated data alongside the error
    Degrade,
}

/// Result of assessing a raw reply under a [`DegradePolicy`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Validated(ValidatedRecord),
    /// Parsed JSON that violates the schema
    Degraded {
        data: ParsedJson,
        error: ValidationError,
    },
    /// Text that is not JSON at all
    Unstructured { raw: String, error: ParseError },
}

impl Outcome {
    /// Parse and validate `raw`, applying `policy` to failures.
    ///
    /// Under [`DegradePolicy::Strict`] failures are returned as errors; under
    /// [`DegradePolicy::Degrade`] this always returns `Ok`.
    pub fn assess(
        raw: &str,
        schema: &SchemaDescriptor,
        policy: DegradePolicy,
    ) -> Result<Outcome, ResponseError> {
        let parsed = match parse_json(raw) {
            Ok(parsed) => parsed,
            Err(error) if policy == DegradePolicy::Degrade => {
                tracing::warn!(schema = %schema.name, %error, "Keeping unparseable reply as text");
                return Ok(Outcome::Unstructured {
                    raw: raw.to_string(),
                    error,
                });
            }
            Err(error) => return Err(error.into()),
        };

        match validate(&parsed, schema) {
            Ok(record) => Ok(Outcome::Validated(record)),
            Err(error) if policy == DegradePolicy::Degrade => {
                tracing::warn!(
                    schema = %schema.name,
                    violations = error.violations.len(),
                    "Keeping reply that failed validation as untyped data"
                );
                Ok(Outcome::Degraded {
                    data: parsed,
                    error,
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn is_validated(&self) -> bool {
        matches!(self, Outcome::Validated(_))
    }

    pub fn record(&self) -> Option<&ValidatedRecord> {
        match self {
            Outcome::Validated(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<ValidatedRecord> {
        match self {
            Outcome::Validated(record) => Some(record),
            _ => None,
        }
    }

    /// Short label: `validated`, `degraded` or `unstructured`.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Validated(_) => "validated",
            Outcome::Degraded { .. } => "degraded",
            Outcome::Unstructured { .. } => "unstructured",
        }
    }

    /// The error a degraded outcome carries.
    pub fn error(&self) -> Option<ResponseError> {
        match self {
            Outcome::Validated(_) => None,
            Outcome::Degraded { error, .. } => Some(error.clone().into()),
            Outcome::Unstructured { error, .. } => Some(error.clone().into()),
        }
    }
}
