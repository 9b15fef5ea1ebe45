//! Python-like stub generation for the code-mode sandbox (spec §4.8).
//!
//! Produces `.pyi`-style signatures and expanded documentation from a
//! tool's JSON-Schema `parameters`, the way `readToolFile`/`getToolDocs`
//! present tools to the LLM.

use std::collections::HashSet;

use serde_json::Value;

/// Convert a camelCase/kebab-case MCP tool name to `snake_case`, the
/// identifier form bound inside the interpreter (spec §4.8 "<snake_name>").
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::new();
    let mut prev_lower_or_digit = false;
    for c in name.chars() {
        if c == '-' || c == ' ' {
            out.push('_');
            prev_lower_or_digit = false;
            continue;
        }
        if c.is_ascii_uppercase() {
            if prev_lower_or_digit {
                out.push('_');
            }
            out.extend(c.to_lowercase());
            prev_lower_or_digit = false;
        } else {
            out.push(c);
            prev_lower_or_digit = c.is_ascii_alphanumeric();
        }
    }
    out
}

fn literal_repr(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{s}\""),
        other => other.to_string(),
    }
}

/// JSON-Schema -> Python-ish type mapping (spec §4.8).
pub fn map_schema_type(schema: &Value) -> String {
    if let Some(values) = schema.get("enum").and_then(Value::as_array) {
        let parts: Vec<String> = values.iter().map(literal_repr).collect();
        return format!("Literal[{}]", parts.join(", "));
    }
    if let Some(c) = schema.get("const") {
        return format!("Literal[{}]", literal_repr(c));
    }
    match schema.get("type").and_then(Value::as_str) {
        Some("string") => "str".to_string(),
        Some("number") => "float".to_string(),
        Some("integer") => "int".to_string(),
        Some("boolean") => "bool".to_string(),
        Some("array") => {
            let inner = schema.get("items").map(map_schema_type).unwrap_or_else(|| "Any".to_string());
            format!("list[{inner}]")
        }
        Some("object") => "dict".to_string(),
        Some("null") => "None".to_string(),
        _ => "Any".to_string(),
    }
}

struct Param {
    name: String,
    ty: String,
    required: bool,
    description: Option<String>,
}

fn collect_params(parameters: &Value) -> Vec<Param> {
    let required: HashSet<&str> = parameters
        .get("required")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let mut names: Vec<&String> = parameters
        .get("properties")
        .and_then(Value::as_object)
        .map(|m| m.keys().collect())
        .unwrap_or_default();
    names.sort();

    let props = parameters.get("properties").and_then(Value::as_object);
    names
        .into_iter()
        .map(|name| {
            let schema = props.and_then(|p| p.get(name)).cloned().unwrap_or(Value::Null);
            Param {
                name: name.clone(),
                ty: map_schema_type(&schema),
                required: required.contains(name.as_str()),
                description: schema.get("description").and_then(Value::as_str).map(str::to_string),
            }
        })
        .collect()
}

/// `def <snake_name>(<required args>, <optional args>=None) -> dict:`
/// (spec §4.8, required args alphabetical first, optional args get `= None`).
pub fn function_signature(tool_name: &str, parameters: &Value) -> String {
    let snake = to_snake_case(tool_name);
    let params = collect_params(parameters);
    let (required, optional): (Vec<_>, Vec<_>) = params.iter().partition(|p| p.required);
    let mut parts: Vec<String> = required.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect();
    parts.extend(optional.iter().map(|p| format!("{}: {} = None", p.name, p.ty)));
    format!("def {snake}({}) -> dict:", parts.join(", "))
}

/// One-line `.pyi` stub entry for a tool, used by `listToolFiles`/`readToolFile`.
pub fn stub_line(tool_name: &str, description: Option<&str>, parameters: &Value) -> String {
    let sig = function_signature(tool_name, parameters);
    match description {
        Some(d) if !d.is_empty() => format!("{sig}\n    \"\"\"{d}\"\"\"\n    ..."),
        _ => format!("{sig}\n    ..."),
    }
}

/// Expanded documentation form for `getToolDocs` (spec §4.8): docstring
/// enumerating Args with descriptions and required/optional tags, a
/// Returns section, and an Example using `print(result)` /
/// `result.get("key", default)`.
pub fn detailed_doc(tool_name: &str, description: Option<&str>, parameters: &Value) -> String {
    let snake = to_snake_case(tool_name);
    let sig = function_signature(tool_name, parameters);
    let params = collect_params(parameters);

    let mut doc = format!("{sig}\n    \"\"\"{}\n\n", description.unwrap_or(""));
    doc.push_str("    Args:\n");
    if params.is_empty() {
        doc.push_str("        (no parameters)\n");
    }
    for p in &params {
        let tag = if p.required { "required" } else { "optional" };
        let desc = p.description.as_deref().unwrap_or("");
        doc.push_str(&format!("        {} ({}, {}): {}\n", p.name, p.ty, tag, desc));
    }
    doc.push_str("\n    Returns:\n        dict: the tool's result payload.\n\n");
    doc.push_str("    Example:\n");
    let example_args: Vec<String> = params
        .iter()
        .filter(|p| p.required)
        .map(|p| format!("{}=...", p.name))
        .collect();
    doc.push_str(&format!("        result = {snake}({})\n", example_args.join(", ")));
    doc.push_str("        print(result)\n");
    doc.push_str("        value = result.get(\"key\", default)\n");
    doc.push_str("    \"\"\"");
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn snake_case_converts_camel_case() {
        assert_eq!(to_snake_case("doThing"), "do_thing");
        assert_eq!(to_snake_case("list-files"), "list_files");
        assert_eq!(to_snake_case("add"), "add");
    }

    #[test]
    fn signature_orders_required_before_optional() {
        let parameters = json!({
            "type": "object",
            "properties": {
                "y": {"type": "integer"},
                "x": {"type": "integer"},
                "label": {"type": "string"}
            },
            "required": ["x", "y"]
        });
        let sig = function_signature("add", &parameters);
        assert_eq!(sig, "def add(x: int, y: int, label: str = None) -> dict:");
    }

    #[test]
    fn array_type_recurses_into_items() {
        let parameters = json!({"type": "object", "properties": {"xs": {"type": "array", "items": {"type": "string"}}}, "required": ["xs"]});
        let sig = function_signature("foo", &parameters);
        assert!(sig.contains("xs: list[str]"));
    }

    #[test]
    fn enum_becomes_literal() {
        let schema = json!({"enum": ["a", "b"]});
        assert_eq!(map_schema_type(&schema), "Literal[\"a\", \"b\"]");
    }

    #[test]
    fn detailed_doc_contains_example_with_get() {
        let parameters = json!({"type": "object", "properties": {"x": {"type": "integer", "description": "first"}}, "required": ["x"]});
        let doc = detailed_doc("add", Some("adds things"), &parameters);
        assert!(doc.contains("Args:"));
        assert!(doc.contains("Returns:"));
        assert!(doc.contains("result.get(\"key\", default)"));
    }
}
