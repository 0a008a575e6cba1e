//! Argument validation against a tool's JSON parameter schema.
//!
//! Covers the subset of JSON Schema that tool definitions use in practice:
//! `type` (single or list), `required`, `properties`, `items`, `enum` and
//! `additionalProperties: false`. Unknown keywords are ignored.

use serde_json::{Map, Value};

use crate::types::ToolError;

/// Validates `arguments` against an object schema.
pub fn validate_arguments(schema: &Value, arguments: &Map<String, Value>) -> Result<(), ToolError> {
    validate_object(schema, arguments, "")
}

fn validate_object(
    schema: &Value,
    object: &Map<String, Value>,
    path: &str,
) -> Result<(), ToolError> {
    if let Some(Value::Array(required)) = schema.get("required") {
        for key in required.iter().filter_map(Value::as_str) {
            match object.get(key) {
                None | Some(Value::Null) => {
                    return Err(ToolError::invalid_arguments(format!(
                        "missing required field '{}'",
                        join(path, key)
                    )));
                }
                Some(_) => {}
            }
        }
    }

    let properties = schema.get("properties").and_then(Value::as_object);
    let closed = schema.get("additionalProperties") == Some(&Value::Bool(false));

    for (key, value) in object {
        match properties.and_then(|p| p.get(key)) {
            Some(property) => validate_value(property, value, &join(path, key))?,
            None if closed => {
                return Err(ToolError::invalid_arguments(format!(
                    "unexpected field '{}'",
                    join(path, key)
                )));
            }
            None => {}
        }
    }

    Ok(())
}

fn validate_value(schema: &Value, value: &Value, path: &str) -> Result<(), ToolError> {
    if let Some(expected) = schema.get("type") {
        let matches = match expected {
            Value::String(t) => type_matches(t, value),
            Value::Array(types) => types
                .iter()
                .filter_map(Value::as_str)
                .any(|t| type_matches(t, value)),
            _ => true,
        };
        if !matches {
            return Err(ToolError::invalid_arguments(format!(
                "field '{}' must be of type {}, got {}",
                path,
                describe_type(expected),
                json_type(value)
            )));
        }
    }

    if let Some(Value::Array(allowed)) = schema.get("enum")
        && !allowed.contains(value)
    {
        return Err(ToolError::invalid_arguments(format!(
            "field '{}' must be one of {}",
            path,
            Value::Array(allowed.clone())
        )));
    }

    match value {
        Value::Object(inner) => validate_object(schema, inner, path),
        Value::Array(items) => match schema.get("items") {
            Some(item_schema) => items.iter().enumerate().try_for_each(|(i, item)| {
                validate_value(item_schema, item, &format!("{}[{}]", path, i))
            }),
            None => Ok(()),
        },
        _ => Ok(()),
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().is_some_and(|f| f.fract() == 0.0)
        }
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(t) => t.clone(),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        other => other.to_string(),
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "city": {"type": "string"},
                "days": {"type": "integer"},
                "unit": {"type": "string", "enum": ["c", "f"]},
                "note": {"type": ["string", "null"]},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["city"]
        })
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_valid_arguments() {
        let result = validate_arguments(
            &schema(),
            &args(json!({"city": "Tokyo", "days": 3, "unit": "c", "note": null, "tags": ["a"]})),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_missing_required() {
        let err = validate_arguments(&schema(), &args(json!({"days": 3}))).unwrap_err();
        assert!(err.contains("missing required field 'city'"));
    }

    #[test]
    fn test_null_required_is_missing() {
        let err = validate_arguments(&schema(), &args(json!({"city": null}))).unwrap_err();
        assert!(err.contains("city"));
    }

    #[test]
    fn test_wrong_type() {
        let err = validate_arguments(&schema(), &args(json!({"city": 42}))).unwrap_err();
        assert!(err.contains("must be of type string, got number"));

        let err =
            validate_arguments(&schema(), &args(json!({"city": "x", "days": 1.5}))).unwrap_err();
        assert!(err.contains("integer"));
    }

    #[test]
    fn test_enum_violation() {
        let err =
            validate_arguments(&schema(), &args(json!({"city": "x", "unit": "k"}))).unwrap_err();
        assert!(err.contains("must be one of"));
    }

    #[test]
    fn test_array_items() {
        let arguments = args(json!({"city": "x", "tags": ["a", 1]}));
        let err = validate_arguments(&schema(), &arguments).unwrap_err();
        assert!(err.contains("tags[1]"));
    }

    #[test]
    fn test_closed_object_rejects_extra_fields() {
        let closed = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        });
        assert!(validate_arguments(&closed, &args(json!({"a": "x"}))).is_ok());
        assert!(validate_arguments(&closed, &args(json!({"a": "x", "b": 1}))).is_err());
        // Open schemas accept extra fields.
        assert!(validate_arguments(&schema(), &args(json!({"city": "x", "b": 1}))).is_ok());
    }
}
