//! JSON Schema rendering of descriptors.
//!
//! The rendered document is what gets sent as
//! `response_format: {"type": "json_schema", ...}` and what `jsonschema`
//! compiles for cross-checking instances.

use serde_json::{json, Map, Value};

use super::{FieldKind, FieldSpec, SchemaDescriptor, SchemaError};

const DRAFT_2020_12: &str = "https://json-schema.org/draft/2020-12/schema";

impl SchemaDescriptor {
    /// Render this descriptor as a JSON Schema document.
    ///
    /// With `strict`, every property is listed in `required`, extra
    /// properties are forbidden and optional fields become nullable. That is
    /// the shape strict structured-output modes accept.
    pub fn to_json_schema(&self, strict: bool) -> Value {
        let mut root = object_schema(self, strict);
        if let Value::Object(map) = &mut root {
            map.insert("$schema".to_string(), json!(DRAFT_2020_12));
            map.insert("title".to_string(), json!(self.name));
        }
        root
    }

    /// Compile the JSON Schema rendering with `jsonschema`.
    pub fn compile_json_schema(&self, strict: bool) -> Result<jsonschema::Validator, SchemaError> {
        let schema = self.to_json_schema(strict);
        jsonschema::options()
            .build(&schema)
            .map_err(|e| SchemaError::Compile(format!("{}: {}", self.name, e)))
    }

    /// Check an instance against the compiled JSON Schema rendering.
    ///
    /// Returns the `jsonschema` error messages; empty means the instance
    /// conforms.
    pub fn json_schema_errors(&self, instance: &Value, strict: bool) -> Result<Vec<String>, SchemaError> {
        let validator = self.compile_json_schema(strict)?;
        Ok(validator
            .iter_errors(instance)
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect())
    }
}

fn object_schema(schema: &SchemaDescriptor, strict: bool) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for field in &schema.fields {
        properties.insert(field.name.clone(), field_schema(field, strict));
        if strict || field.required {
            required.push(json!(field.name));
        }
    }

    let mut map = Map::new();
    map.insert("type".to_string(), json!("object"));
    if let Some(description) = &schema.description {
        map.insert("description".to_string(), json!(description));
    }
    map.insert("properties".to_string(), Value::Object(properties));
    map.insert("required".to_string(), Value::Array(required));
    if strict || schema.closed {
        map.insert("additionalProperties".to_string(), json!(false));
    }
    Value::Object(map)
}

fn field_schema(field: &FieldSpec, strict: bool) -> Value {
    // In strict mode an omittable field must be expressed as nullable.
    let nullable = field.nullable || (strict && !field.required);
    let mut value = kind_schema(&field.kind, strict);

    if let Value::Object(map) = &mut value {
        if nullable {
            if let Some(ty) = map.get("type").cloned() {
                map.insert("type".to_string(), json!([ty, "null"]));
            }
            if let Some(Value::Array(values)) = map.get_mut("enum") {
                values.push(Value::Null);
            }
        }
        if let Some(description) = &field.description {
            map.insert("description".to_string(), json!(description));
        }
    }
    value
}

fn kind_schema(kind: &FieldKind, strict: bool) -> Value {
    let mut map = Map::new();
    map.insert("type".to_string(), json!(kind.json_type()));

    match kind {
        FieldKind::String {
            min_length,
            max_length,
            pattern,
        } => {
            insert_opt(&mut map, "minLength", min_length);
            insert_opt(&mut map, "maxLength", max_length);
            if let Some(p) = pattern {
                map.insert("pattern".to_string(), json!(format!("^(?:{})$", p)));
            }
        }
        FieldKind::Integer { minimum, maximum } => {
            insert_opt(&mut map, "minimum", minimum);
            insert_opt(&mut map, "maximum", maximum);
        }
        FieldKind::Number { minimum, maximum } => {
            insert_opt(&mut map, "minimum", minimum);
            insert_opt(&mut map, "maximum", maximum);
        }
        FieldKind::Boolean => {}
        FieldKind::Enum { values } => {
            map.insert("enum".to_string(), json!(values));
        }
        FieldKind::Array {
            items,
            min_items,
            max_items,
        } => {
            map.insert("items".to_string(), kind_schema(items, strict));
            insert_opt(&mut map, "minItems", min_items);
            insert_opt(&mut map, "maxItems", max_items);
        }
        FieldKind::Object { schema } => return object_schema(schema, strict),
    }

    Value::Object(map)
}

fn insert_opt<T: serde::Serialize>(map: &mut Map<String, Value>, key: &str, value: &Option<T>) {
    if let Some(v) = value {
        map.insert(key.to_string(), json!(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::catalog;

    #[test]
    fn test_loose_export_lists_only_required_fields() {
        let schema = catalog::note().to_json_schema(false);
        assert_eq!(schema["title"], "note");
        assert_eq!(schema["required"], json!(["id", "heading", "summary"]));
        assert_eq!(schema["properties"]["summary"]["maxLength"], 150);
        assert!(schema.get("additionalProperties").is_none());
    }

    #[test]
    fn test_strict_export_requires_everything() {
        let schema = catalog::note().to_json_schema(true);
        assert_eq!(
            schema["required"],
            json!(["id", "heading", "summary", "page_ref"])
        );
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(
            schema["properties"]["page_ref"]["type"],
            json!(["integer", "null"])
        );
    }

    #[test]
    fn test_closed_schema_forbids_additional_properties() {
        let schema = catalog::tech_analysis().to_json_schema(false);
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(
            schema["properties"]["difficulty_level"]["enum"],
            json!(["Beginner", "Intermediate", "Advanced"])
        );
        assert_eq!(schema["properties"]["key_benefits"]["items"]["type"], "string");
    }

    #[test]
    fn test_nullable_enum_admits_null() {
        let descriptor = SchemaDescriptor::new("t").field(
            FieldSpec::new("level", FieldKind::enumeration(["a", "b"])).nullable(),
        );
        let schema = descriptor.to_json_schema(false);
        assert_eq!(schema["properties"]["level"]["enum"], json!(["a", "b", null]));
        assert_eq!(schema["properties"]["level"]["type"], json!(["string", "null"]));
    }

    #[test]
    fn test_pattern_exported_anchored() {
        let descriptor = SchemaDescriptor::new("t").field(FieldSpec::new(
            "code",
            FieldKind::matching(crate::schema::Pattern::new("[A-Z][0-9]+").unwrap()),
        ));
        let schema = descriptor.to_json_schema(false);
        assert_eq!(schema["properties"]["code"]["pattern"], "^(?:[A-Z][0-9]+)$");
        let errors = descriptor.json_schema_errors(&json!({ "code": "xB1" }), false).unwrap();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_nested_collection_export() {
        let schema = catalog::note_collection().to_json_schema(false);
        let items = &schema["properties"]["notes"]["items"];
        assert_eq!(items["type"], "object");
        assert_eq!(items["properties"]["id"]["minimum"], 1);
        assert_eq!(items["properties"]["id"]["maximum"], 10);
        assert!(items.get("$schema").is_none());
    }

    #[test]
    fn test_every_catalog_schema_compiles() {
        for name in catalog::names() {
            let descriptor = catalog::lookup(name).unwrap();
            assert!(descriptor.compile_json_schema(false).is_ok(), "{} (loose)", name);
            assert!(descriptor.compile_json_schema(true).is_ok(), "{} (strict)", name);
        }
    }

    #[test]
    fn test_jsonschema_agrees_on_valid_instance() {
        let instance = json!({
            "id": 3,
            "heading": "Mean Value Theorem",
            "summary": "A differentiable function attains its average rate of change somewhere.",
            "page_ref": null
        });
        let errors = catalog::note().json_schema_errors(&instance, true).unwrap();
        assert!(errors.is_empty(), "{:?}", errors);
    }

    #[test]
    fn test_jsonschema_reports_invalid_instance() {
        let instance = json!({ "id": 42, "heading": "Limits" });
        let errors = catalog::note().json_schema_errors(&instance, false).unwrap();
        assert!(!errors.is_empty());
    }
}
