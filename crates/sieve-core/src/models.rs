//! Strongly-typed records for the built-in schemas.
//!
//! These are only ever produced from a [`ValidatedRecord`]; raw model output
//! is never decoded into them directly.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::{RecordError, ValidatedRecord};
use crate::schema::{catalog, SchemaDescriptor};

/// A typed struct backed by a schema descriptor.
pub trait StructuredRecord: DeserializeOwned + Serialize {
    /// Descriptor the raw output is validated against before conversion.
    fn schema() -> &'static SchemaDescriptor;

    /// Convert a record validated against [`Self::schema`].
    fn from_record(record: ValidatedRecord) -> Result<Self, RecordError> {
        let expected = &Self::schema().name;
        if record.schema_name() != expected {
            return Err(RecordError::SchemaMismatch {
                expected: expected.clone(),
                found: record.schema_name().to_string(),
            });
        }
        record.into_typed()
    }
}

/// Weather alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    pub location: String,
    pub severity: Severity,
    pub alert_type: String,
    pub description: String,
    pub advice: String,
    pub expires_at: Option<String>,
}

impl StructuredRecord for WeatherAlert {
    fn schema() -> &'static SchemaDescriptor {
        catalog::weather_alert()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DifficultyLevel::Beginner => "Beginner",
            DifficultyLevel::Intermediate => "Intermediate",
            DifficultyLevel::Advanced => "Advanced",
        };
        f.write_str(label)
    }
}

/// Analysis of a programming concept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechAnalysis {
    pub concept: String,
    pub difficulty_level: DifficultyLevel,
    pub key_benefits: Vec<String>,
    pub common_pitfalls: Vec<String>,
    pub use_cases: Vec<String>,
    pub learning_resources: Vec<String>,
}

impl StructuredRecord for TechAnalysis {
    fn schema() -> &'static SchemaDescriptor {
        catalog::tech_analysis()
    }
}

/// One exam study note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: u8,
    pub heading: String,
    pub summary: String,
    /// Page number in the source document
    pub page_ref: Option<i64>,
}

impl StructuredRecord for Note {
    fn schema() -> &'static SchemaDescriptor {
        catalog::note()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteCollection {
    pub notes: Vec<Note>,
}

impl StructuredRecord for NoteCollection {
    fn schema() -> &'static SchemaDescriptor {
        catalog::note_collection()
    }
}
