//! Virtual file system for the code-mode sandbox (spec §4.8
//! `listToolFiles`/`readToolFile`).
//!
//! Tools are exposed to the LLM as `.pyi`-style files, one per code-mode
//! client or one per tool depending on [`BindingLevel`]. Nothing here
//! touches the real filesystem; every "file" is generated on demand from
//! the connected clients' tool maps.

use crate::config::BindingLevel;
use crate::connection_manager::ClientSnapshot;
use crate::error::SandboxError;
use crate::registry::naming::strip_client_prefix;
use crate::sandbox::stub::{detailed_doc, stub_line, to_snake_case};

struct ToolEntry {
    client: String,
    tool_name: String,
    description: Option<String>,
    parameters: serde_json::Value,
}

fn code_mode_tools(snapshots: &[ClientSnapshot]) -> Vec<ToolEntry> {
    let mut out = Vec::new();
    for snap in snapshots {
        if !snap.is_code_mode_client || !snap.connected {
            continue;
        }
        let mut names: Vec<&String> = snap.tool_map.keys().collect();
        names.sort();
        for prefixed in names {
            let Some(unprefixed) = strip_client_prefix(&snap.name, prefixed) else {
                continue;
            };
            let schema = &snap.tool_map[prefixed];
            let function = schema.get("function").cloned().unwrap_or(schema.clone());
            let description = function.get("description").and_then(serde_json::Value::as_str).map(str::to_string);
            let parameters = function.get("parameters").cloned().unwrap_or(serde_json::json!({}));
            out.push(ToolEntry {
                client: snap.name.clone(),
                tool_name: unprefixed.to_string(),
                description,
                parameters,
            });
        }
    }
    out
}

/// File paths for every code-mode tool, grouped per [`BindingLevel`]
/// (spec §4.8 `listToolFiles`).
pub fn list_tool_files(snapshots: &[ClientSnapshot], binding_level: BindingLevel) -> Vec<String> {
    let entries = code_mode_tools(snapshots);
    match binding_level {
        BindingLevel::Server => {
            let mut clients: Vec<String> = entries.iter().map(|e| e.client.clone()).collect();
            clients.sort();
            clients.dedup();
            clients.iter().map(|c| format!("servers/{c}.pyi")).collect()
        }
        BindingLevel::Tool => entries
            .iter()
            .map(|e| format!("servers/{}/{}.pyi", e.client, to_snake_case(&e.tool_name)))
            .collect(),
    }
}

fn file_content_for_client(snapshots: &[ClientSnapshot], client: &str) -> String {
    let mut lines = Vec::new();
    for entry in code_mode_tools(snapshots).into_iter().filter(|e| e.client == client) {
        lines.push(stub_line(&entry.tool_name, entry.description.as_deref(), &entry.parameters));
    }
    lines.join("\n\n")
}

fn file_content_for_tool(snapshots: &[ClientSnapshot], client: &str, tool_name: &str) -> Option<String> {
    code_mode_tools(snapshots)
        .into_iter()
        .find(|e| e.client == client && to_snake_case(&e.tool_name) == tool_name)
        .map(|e| stub_line(&e.tool_name, e.description.as_deref(), &e.parameters))
}

/// Resolve `path` against the generated tree, case-insensitively (spec
/// §4.8 `readToolFile`). Matching more than one path is ambiguous; matching
/// none is a not-found error.
fn resolve_path(snapshots: &[ClientSnapshot], binding_level: BindingLevel, path: &str) -> Result<(String, String), SandboxError> {
    let tree = list_tool_files(snapshots, binding_level);
    let matches: Vec<&String> = tree.iter().filter(|p| p.eq_ignore_ascii_case(path)).collect();
    match matches.len() {
        0 => Err(SandboxError::FileNotFound(path.to_string())),
        1 => {
            let resolved = matches[0].clone();
            let content = match binding_level {
                BindingLevel::Server => {
                    let client = resolved
                        .strip_prefix("servers/")
                        .and_then(|s| s.strip_suffix(".pyi"))
                        .unwrap_or_default();
                    file_content_for_client(snapshots, client)
                }
                BindingLevel::Tool => {
                    let rest = resolved.strip_prefix("servers/").unwrap_or_default();
                    let (client, tool) = rest.split_once('/').unwrap_or(("", rest));
                    let tool = tool.strip_suffix(".pyi").unwrap_or(tool);
                    file_content_for_tool(snapshots, client, tool).unwrap_or_default()
                }
            };
            Ok((resolved, content))
        }
        _ => Err(SandboxError::AmbiguousFileName(path.to_string(), matches.into_iter().cloned().collect())),
    }
}

/// Read (a possibly-sliced range of) the generated file at `path` (spec
/// §4.8 `readToolFile`). Lines are 1-based and inclusive; omitting either
/// bound reads from/to the edge of the file. Out-of-range bounds clamp
/// silently rather than erroring.
pub fn read_tool_file(
    snapshots: &[ClientSnapshot],
    binding_level: BindingLevel,
    path: &str,
    start_line: Option<usize>,
    end_line: Option<usize>,
) -> Result<String, SandboxError> {
    let (_, content) = resolve_path(snapshots, binding_level, path)?;
    let all_lines: Vec<&str> = content.lines().collect();
    let total = all_lines.len();
    // The header line itself counts toward the file's total (spec §4.8:
    // "the header line included in the total").
    let header_total = total + 1;

    let start = start_line.unwrap_or(1).max(1);
    let end = end_line.unwrap_or(total).min(total.max(1));

    let slice: String = if start > total || start > end {
        String::new()
    } else {
        all_lines[(start - 1)..end].join("\n")
    };

    Ok(format!(
        "# Total lines: {header_total} (this is the complete file, no further reads are needed)\n{slice}"
    ))
}

/// Expanded documentation for a single tool (spec §4.8 `getToolDocs`),
/// addressed by client name and tool name (either form: original MCP name
/// or the bound snake_case identifier).
pub fn get_tool_docs(snapshots: &[ClientSnapshot], client: &str, tool_name: &str) -> Result<String, SandboxError> {
    let target = to_snake_case(tool_name);
    code_mode_tools(snapshots)
        .into_iter()
        .find(|e| e.client == client && to_snake_case(&e.tool_name) == target)
        .map(|e| detailed_doc(&e.tool_name, e.description.as_deref(), &e.parameters))
        .ok_or_else(|| SandboxError::FileNotFound(format!("{client}.{tool_name}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn snapshot(name: &str) -> ClientSnapshot {
        let mut tool_map = HashMap::new();
        tool_map.insert(
            format!("{name}-add"),
            json!({
                "type": "function",
                "function": {
                    "name": format!("{name}-add"),
                    "description": "adds two numbers",
                    "parameters": {"type": "object", "properties": {"x": {"type": "integer"}}, "required": ["x"]}
                }
            }),
        );
        ClientSnapshot {
            id: name.to_string(),
            name: name.to_string(),
            tool_map,
            name_mapping: HashMap::new(),
            tools_to_execute: crate::registry::filter_list::NameFilter::all(),
            tools_to_auto_execute: crate::registry::filter_list::NameFilter::all(),
            is_code_mode_client: true,
            connected: true,
            conn: None as Option<Arc<dyn crate::transport::McpTransport>>,
        }
    }

    #[test]
    fn server_level_lists_one_file_per_client() {
        let snapshots = vec![snapshot("calc")];
        let files = list_tool_files(&snapshots, BindingLevel::Server);
        assert_eq!(files, vec!["servers/calc.pyi".to_string()]);
    }

    #[test]
    fn tool_level_lists_one_file_per_tool() {
        let snapshots = vec![snapshot("calc")];
        let files = list_tool_files(&snapshots, BindingLevel::Tool);
        assert_eq!(files, vec!["servers/calc/add.pyi".to_string()]);
    }

    #[test]
    fn read_tool_file_is_case_insensitive_and_has_total_lines_header() {
        let snapshots = vec![snapshot("calc")];
        let content = read_tool_file(&snapshots, BindingLevel::Server, "SERVERS/CALC.PYI", None, None).unwrap();
        assert!(content.starts_with("# Total lines:"));
        assert!(content.contains("def add(x: int) -> dict:"));
    }

    #[test]
    fn read_tool_file_unknown_path_errors() {
        let snapshots = vec![snapshot("calc")];
        let err = read_tool_file(&snapshots, BindingLevel::Server, "servers/missing.pyi", None, None);
        assert!(matches!(err, Err(SandboxError::FileNotFound(_))));
    }

    #[test]
    fn get_tool_docs_resolves_by_snake_case_name() {
        let snapshots = vec![snapshot("calc")];
        let doc = get_tool_docs(&snapshots, "calc", "add").unwrap();
        assert!(doc.contains("Args:"));
    }

    #[test]
    fn read_tool_file_line_range_is_inclusive_one_based() {
        let snapshots = vec![snapshot("calc")];
        let content = read_tool_file(&snapshots, BindingLevel::Server, "servers/calc.pyi", Some(1), Some(1)).unwrap();
        let body = content.lines().nth(1).unwrap_or_default();
        assert_eq!(body, "def add(x: int) -> dict:");
    }

    #[test]
    fn read_tool_file_total_lines_counts_the_header_itself() {
        let snapshots = vec![snapshot("calc")];
        let content = read_tool_file(&snapshots, BindingLevel::Server, "servers/calc.pyi", None, None).unwrap();
        let header = content.lines().next().unwrap();
        let reported: usize = header
            .trim_start_matches("# Total lines: ")
            .split(' ')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(reported, content.lines().count());
    }
}
