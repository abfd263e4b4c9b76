//! JSON-Schema `$ref` flattening.
//!
//! Some providers reject schema references outright, so every tool schema
//! is inlined before dispatch: each `{"$ref": "#/$defs/X"}` is replaced by
//! a deep copy of the resolved definition (recursively) and `$defs` is
//! dropped. The walk preserves key order; serde_json is built with
//! `preserve_order` because at least one downstream provider is sensitive
//! to it.

use serde_json::{Map, Value};

use crate::provider::ToolDefinition;

/// Recursively expand all `$ref` references in a JSON Schema. Idempotent:
/// a schema without refs comes back equal (modulo the dropped, empty
/// `$defs`).
pub fn flatten_json_schema(schema: &Value) -> Value {
    let mut schema = schema.clone();
    let defs = match &mut schema {
        Value::Object(map) => match map.remove("$defs") {
            Some(Value::Object(defs)) => defs,
            _ => Map::new(),
        },
        _ => Map::new(),
    };
    resolve_refs(&schema, &defs)
}

fn resolve_refs(value: &Value, defs: &Map<String, Value>) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref") {
                // e.g. "#/$defs/SopStep"; resolve by trailing segment.
                let ref_name = ref_path.rsplit('/').next().unwrap_or_default();
                let resolved = defs.get(ref_name).cloned().unwrap_or(Value::Object(Map::new()));
                return resolve_refs(&resolved, defs);
            }
            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), resolve_refs(v, defs)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| resolve_refs(v, defs)).collect()),
        other => other.clone(),
    }
}

/// Flatten the parameter schema of every tool definition.
pub fn flatten_tool_schemas(tools: &[ToolDefinition]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|tool| ToolDefinition {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: flatten_json_schema(&tool.parameters),
        })
        .collect()
}
