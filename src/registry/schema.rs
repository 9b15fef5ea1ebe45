//! Tool-schema normalization (spec §3).
//!
//! `{type: "function", function: {name, description?, parameters}}` schemas
//! arriving from an MCP server are normalized before being stored in a
//! client's `toolMap`: array schemas without an `items` key are rewritten
//! with an empty `items: {}`, recursively including `anyOf`/`oneOf`/`allOf`
//! branches and nested `object` properties.

use serde_json::{json, Value};

/// Build a `{type: "function", function: {...}}` tool schema for a given
/// prefixed name, description, and (already-normalized) JSON-Schema
/// parameters object.
pub fn build_tool_schema(name: &str, description: Option<&str>, parameters: Value) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": name,
            "description": description.unwrap_or(""),
            "parameters": normalize_schema(parameters),
        }
    })
}

/// Recursively normalize a JSON-Schema value: any `"type": "array"` node
/// lacking `items` gets `items: {}`; the same rewrite is applied inside
/// `anyOf`/`oneOf`/`allOf` branches and nested `object` `properties`.
pub fn normalize_schema(mut schema: Value) -> Value {
    normalize_schema_in_place(&mut schema);
    schema
}

fn normalize_schema_in_place(schema: &mut Value) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };

    let is_array = obj.get("type").and_then(Value::as_str) == Some("array");
    if is_array && !obj.contains_key("items") {
        obj.insert("items".to_string(), json!({}));
    }
    if let Some(items) = obj.get_mut("items") {
        normalize_schema_in_place(items);
    }

    if let Some(props) = obj.get_mut("properties").and_then(Value::as_object_mut) {
        for (_, prop) in props.iter_mut() {
            normalize_schema_in_place(prop);
        }
    }

    for key in ["anyOf", "oneOf", "allOf"] {
        if let Some(branches) = obj.get_mut(key).and_then(Value::as_array_mut) {
            for branch in branches.iter_mut() {
                normalize_schema_in_place(branch);
            }
        }
    }
}

/// Rewrite a tool schema's `function.name` in place (used by
/// `ConnectionManager::edit` when renaming a client).
pub fn rename_function(schema: &mut Value, new_name: &str) {
    if let Some(function) = schema.get_mut("function").and_then(Value::as_object_mut) {
        function.insert("name".to_string(), Value::String(new_name.to_string()));
    }
}
