//! JSON schema handling: record validation and the published schema
//!
//! The published schema describes normalized documents, so it is the source
//! schema plus the fields the normalizer adds.

use crate::report::NormalizeReport;
use lrmeta_common::{Error, Result};
use serde_json::{json, Map, Value};
use std::path::Path;

/// Compiled record schema
pub struct SchemaValidator {
    validator: jsonschema::Validator,
}

impl SchemaValidator {
    pub fn new(schema: &Value) -> Result<Self> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| Error::InvalidInput(format!("Invalid schema: {}", e)))?;
        Ok(Self { validator })
    }

    /// Load and compile the schema; failures disable validation with a warning
    pub fn load(path: &Path, report: &mut NormalizeReport) -> Option<Self> {
        match load_schema(path).and_then(|schema| Self::new(&schema)) {
            Ok(validator) => Some(validator),
            Err(e) => {
                report.warn(format!("Record validation disabled: {}", e));
                None
            }
        }
    }

    /// Every validation error for `instance`, empty when valid
    pub fn validate(&self, instance: &Value) -> Vec<String> {
        self.validator
            .iter_errors(instance)
            .map(|e| e.to_string())
            .collect()
    }
}

/// Read a JSON schema file
pub fn load_schema(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read schema {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&content)?)
}

/// Extend the source schema with the fields normalized documents carry
pub fn adapt_schema(mut schema: Value) -> Value {
    if !schema.is_object() {
        return schema;
    }

    let added_properties = json!({
        "id": {
            "description": "Unique identifier for the resource",
            "type": "string",
            "pattern": "^[a-z0-9_.-]+$"
        },
        "has_description": {
            "description": "If set to true, the resource has a description",
            "type": "boolean",
            "default": false
        },
        "downloads": {
            "items": {
                "properties": {
                    "size": {"type": "integer", "description": "File size in bytes"},
                    "last-modified": {"type": "string", "description": "Last modified date"}
                }
            }
        }
    });
    if let Some(root) = schema.as_object_mut() {
        let properties = root
            .entry("properties")
            .or_insert_with(|| Value::Object(Map::new()));
        deep_merge(properties, &added_properties);

        let required = root
            .entry("required")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Some(list) = required.as_array_mut() {
            if !list.iter().any(|v| v == "id") {
                list.push(json!("id"));
            }
        }
    }

    let localized_term = |what: &str| {
        json!({
            "type": "object",
            "additionalProperties": false,
            "properties": {
                "eng": {"description": format!("{} name in English", what), "type": "string"},
                "swe": {"description": format!("{} name in Swedish", what), "type": "string"}
            }
        })
    };
    let conditionals = [
        (
            "analysis",
            json!({
                "task": localized_term("Task"),
                "analysis_unit": localized_term("Unit")
            }),
        ),
        (
            "collection",
            json!({
                "size": {
                    "description": "Size information about the collection",
                    "type": "object",
                    "additionalProperties": true,
                    "properties": {
                        "resources": {
                            "description": "Number of resources in the collection",
                            "type": "integer"
                        }
                    }
                }
            }),
        ),
    ];
    for (condition, update) in conditionals {
        if let Some(branch) = find_conditional(&mut schema, condition) {
            let then = branch
                .as_object_mut()
                .map(|b| b.entry("then").or_insert_with(|| json!({})));
            if let Some(then) = then.and_then(Value::as_object_mut) {
                let properties = then
                    .entry("properties")
                    .or_insert_with(|| Value::Object(Map::new()));
                deep_merge(properties, &update);
            }
        }
    }

    schema
}

/// Find the object holding an `if` whose condition names `key`, either as a
/// property or as a value of the `type` enum
fn find_conditional<'a>(node: &'a mut Value, key: &str) -> Option<&'a mut Value> {
    let matches_here = node
        .get("if")
        .and_then(|cond| cond.get("properties"))
        .map(|props| {
            props.get(key).is_some()
                || props
                    .get("type")
                    .and_then(|t| t.get("enum"))
                    .and_then(Value::as_array)
                    .map(|values| values.iter().any(|v| v == key))
                    .unwrap_or(false)
        })
        .unwrap_or(false);
    if matches_here {
        return Some(node);
    }

    match node {
        Value::Object(map) => map.values_mut().find_map(|v| find_conditional(v, key)),
        Value::Array(items) => items.iter_mut().find_map(|v| find_conditional(v, key)),
        _ => None,
    }
}

/// Recursively merge `update` into `target`; non-object values are replaced
fn deep_merge(target: &mut Value, update: &Value) {
    let Some(update_map) = update.as_object() else {
        *target = update.clone();
        return;
    };
    if !target.is_object() {
        *target = update.clone();
        return;
    }
    let Some(target_map) = target.as_object_mut() else {
        return;
    };

    for (key, value) in update_map {
        let nested = value.is_object() && target_map.get(key).map(Value::is_object).unwrap_or(false);
        if nested {
            if let Some(existing) = target_map.get_mut(key) {
                deep_merge(existing, value);
            }
        } else {
            target_map.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_schema() -> Value {
        json!({
            "type": "object",
            "required": ["name", "type"],
            "properties": {
                "name": {"type": "object"},
                "type": {"type": "string", "enum": ["corpus", "lexicon", "analysis", "collection"]},
                "downloads": {
                    "type": "array",
                    "items": {"type": "object", "properties": {"url": {"type": "string"}}}
                }
            },
            "allOf": [
                {
                    "if": {"properties": {"type": {"enum": ["analysis"]}}},
                    "then": {"properties": {"task": {"type": "string"}}}
                },
                {
                    "if": {"properties": {"collection": {"const": true}}},
                    "then": {"properties": {"resources": {"type": "array"}}}
                }
            ]
        })
    }

    #[test]
    fn test_adapt_schema_adds_output_fields() {
        let adapted = adapt_schema(source_schema());

        assert_eq!(adapted["properties"]["id"]["type"], "string");
        assert_eq!(adapted["properties"]["has_description"]["type"], "boolean");
        assert_eq!(adapted["required"], json!(["name", "type", "id"]));

        let download_props = &adapted["properties"]["downloads"]["items"]["properties"];
        assert_eq!(download_props["url"]["type"], "string");
        assert_eq!(download_props["size"]["type"], "integer");

        assert_eq!(adapted["allOf"][0]["then"]["properties"]["task"]["type"], "object");
        assert_eq!(
            adapted["allOf"][1]["then"]["properties"]["size"]["properties"]["resources"]["type"],
            "integer"
        );
        assert_eq!(adapted["allOf"][1]["then"]["properties"]["resources"]["type"], "array");
    }

    #[test]
    fn test_adapt_is_stable() {
        let once = adapt_schema(source_schema());
        let twice = adapt_schema(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_validator_reports_errors() {
        let validator = SchemaValidator::new(&source_schema()).unwrap();
        assert!(validator
            .validate(&json!({"name": {"eng": "A"}, "type": "corpus"}))
            .is_empty());

        let errors = validator.validate(&json!({"name": "plain", "type": "thing"}));
        assert_eq!(errors.len(), 2);
    }
}
