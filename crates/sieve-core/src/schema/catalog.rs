//! Built-in descriptors for the structured replies the runtime requests.

use lazy_static::lazy_static;

use super::{FieldKind, FieldSpec, SchemaDescriptor};

/// Allowed weather alert severities.
pub const SEVERITIES: [&str; 4] = ["low", "medium", "high", "critical"];

/// Allowed difficulty levels for a tech analysis.
pub const DIFFICULTY_LEVELS: [&str; 3] = ["Beginner", "Intermediate", "Advanced"];

/// Maximum number of notes in a study-note collection.
pub const MAX_NOTES: usize = 10;

lazy_static! {
    static ref WEATHER_ALERT: SchemaDescriptor = build_weather_alert();
    static ref TECH_ANALYSIS: SchemaDescriptor = build_tech_analysis();
    static ref NOTE: SchemaDescriptor = build_note();
    static ref NOTE_COLLECTION: SchemaDescriptor = build_note_collection();
}

fn build_weather_alert() -> SchemaDescriptor {
    SchemaDescriptor::new("weather_alert")
        .describe("Weather alert information")
        .field(
            FieldSpec::new("location", FieldKind::text())
                .describe("Geographic location of the alert"),
        )
        .field(
            FieldSpec::new("severity", FieldKind::enumeration(SEVERITIES))
                .describe("Alert severity: low, medium, high, critical"),
        )
        .field(FieldSpec::new("alert_type", FieldKind::text()).describe("Type of weather alert"))
        .field(
            FieldSpec::new("description", FieldKind::text())
                .describe("Detailed description of the weather condition"),
        )
        .field(
            FieldSpec::new("advice", FieldKind::text()).describe("Recommended actions for safety"),
        )
        .field(
            FieldSpec::new("expires_at", FieldKind::text())
                .nullable()
                .describe("When the alert expires (if known)"),
        )
}

fn build_tech_analysis() -> SchemaDescriptor {
    let list = || FieldKind::list_of(FieldKind::text());

    SchemaDescriptor::new("tech_analysis")
        .describe("Analysis of a programming or technology concept")
        .field(
            FieldSpec::new("concept", FieldKind::text())
                .describe("The programming concept being analyzed"),
        )
        .field(
            FieldSpec::new("difficulty_level", FieldKind::enumeration(DIFFICULTY_LEVELS))
                .describe("Beginner, Intermediate, or Advanced"),
        )
        .field(FieldSpec::new("key_benefits", list()).describe("Main advantages of this concept"))
        .field(FieldSpec::new("common_pitfalls", list()).describe("Common mistakes to avoid"))
        .field(FieldSpec::new("use_cases", list()).describe("Practical applications"))
        .field(
            FieldSpec::new("learning_resources", list())
                .describe("Recommended learning materials"),
        )
        .closed()
}

fn build_note() -> SchemaDescriptor {
    SchemaDescriptor::new("note")
        .describe("A single exam study note")
        .field(
            FieldSpec::new("id", FieldKind::integer_between(1, MAX_NOTES as i64))
                .describe("Position of the note, 1 to 10"),
        )
        .field(FieldSpec::new("heading", FieldKind::text()).describe("Topic, e.g. Mean Value Theorem"))
        .field(FieldSpec::new("summary", FieldKind::text_up_to(150)).describe("Brief explanation"))
        .field(
            FieldSpec::new(
                "page_ref",
                FieldKind::Integer {
                    minimum: Some(1),
                    maximum: None,
                },
            )
            .optional()
            .describe("Page number in source PDF"),
        )
}

fn build_note_collection() -> SchemaDescriptor {
    SchemaDescriptor::new("note_collection")
        .describe("Study notes generated from source material")
        .field(FieldSpec::new(
            "notes",
            FieldKind::Array {
                items: Box::new(FieldKind::record(build_note())),
                min_items: Some(1),
                max_items: Some(MAX_NOTES),
            },
        ))
}

/// Weather alert, open to extra fields; `expires_at` may be `null`.
pub fn weather_alert() -> &'static SchemaDescriptor {
    &WEATHER_ALERT
}

/// Tech concept analysis; closed, every field required.
pub fn tech_analysis() -> &'static SchemaDescriptor {
    &TECH_ANALYSIS
}

pub fn note() -> &'static SchemaDescriptor {
    &NOTE
}

/// `{"notes": [note, ...]}` with 1 to 10 notes.
pub fn note_collection() -> &'static SchemaDescriptor {
    &NOTE_COLLECTION
}

/// Names of all built-in descriptors.
pub fn names() -> [&'static str; 4] {
    ["weather_alert", "tech_analysis", "note", "note_collection"]
}

/// Find a built-in descriptor by name.
pub fn lookup(name: &str) -> Option<&'static SchemaDescriptor> {
    match name {
        "weather_alert" => Some(weather_alert()),
        "tech_analysis" => Some(tech_analysis()),
        "note" => Some(note()),
        "note_collection" => Some(note_collection()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_builtins_are_consistent() {
        for name in names() {
            let schema = lookup(name).unwrap();
            assert_eq!(schema.name, name);
            assert!(schema.check().is_ok(), "{} failed check", name);
        }
    }

    #[test]
    fn test_unknown_lookup() {
        assert!(lookup("horoscope").is_none());
    }

    #[test]
    fn test_weather_alert_shape() {
        let schema = weather_alert();
        assert!(!schema.closed);
        assert_eq!(schema.fields.len(), 6);
        let expires = schema.get("expires_at").unwrap();
        assert!(expires.required);
        assert!(expires.nullable);
    }

    #[test]
    fn test_tech_analysis_is_closed() {
        let schema = tech_analysis();
        assert!(schema.closed);
        assert!(schema.fields.iter().all(|f| f.required && !f.nullable));
    }

    #[test]
    fn test_note_page_ref_optional() {
        let page_ref = note().get("page_ref").unwrap();
        assert!(!page_ref.required);
        assert!(page_ref.accepts_null());
    }
}
