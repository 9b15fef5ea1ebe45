//! Tool-Request Enrichment (spec §2 row 12, §4.9).
//!
//! Flattens the currently-visible tools (§4.4) into an outgoing LLM request,
//! adds the code-mode meta-tools when at least one visible client is
//! code-mode, and applies the integration-aware duplicate policy so a tool
//! the caller already listed is never re-added.

use serde_json::{json, Value};
use std::collections::HashSet;

use crate::connection_manager::ClientSnapshot;
use crate::policy::{is_duplicate, visible_tools, RequestFilter};
use crate::sandbox::{EXECUTE_TOOL_CODE, GET_TOOL_DOCS, LIST_TOOL_FILES, READ_TOOL_FILE};

/// Merge every currently-visible tool (plus code-mode meta-tools, if
/// applicable) into `existing_tools`, respecting the duplicate policy.
/// Returns the full tool list to install on the outgoing request.
///
/// Per spec §4.9 "Preserve caller-supplied parameters; only allocate a
/// parameters container if one was not supplied" — that half of the
/// contract belongs to the caller building the request; this function only
/// ever appends, it never removes or rewrites an existing entry.
pub fn enrich_tools(existing_tools: Option<&[Value]>, snapshots: &[ClientSnapshot], request_filter: &RequestFilter) -> Vec<Value> {
    let mut tools: Vec<Value> = existing_tools.map(|t| t.to_vec()).unwrap_or_default();
    let mut names: HashSet<String> = tools.iter().filter_map(tool_name).collect();

    for (_, schema) in visible_tools(snapshots, request_filter) {
        let Some(name) = tool_name(&schema) else { continue };
        if is_duplicate(&names, &name) {
            continue;
        }
        names.insert(name);
        tools.push(schema);
    }

    if has_code_mode_client(snapshots, request_filter) {
        for schema in meta_tool_schemas() {
            let Some(name) = tool_name(&schema) else { continue };
            if is_duplicate(&names, &name) {
                continue;
            }
            names.insert(name);
            tools.push(schema);
        }
    }

    tools
}

fn tool_name(schema: &Value) -> Option<String> {
    schema.get("function")?.get("name")?.as_str().map(str::to_string)
}

fn has_code_mode_client(snapshots: &[ClientSnapshot], request_filter: &RequestFilter) -> bool {
    snapshots
        .iter()
        .any(|s| s.connected && s.is_code_mode_client && request_filter.include_clients.allows(&s.name, true))
}

/// The four code-mode meta-tool schemas (spec §4.8), exposed to the LLM
/// whenever at least one visible client is code-mode.
pub fn meta_tool_schemas() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": LIST_TOOL_FILES,
                "description": "List the virtual files describing the tools available in code mode.",
                "parameters": {"type": "object", "properties": {}},
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": READ_TOOL_FILE,
                "description": "Read a virtual tool-stub file, optionally sliced by line range.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "fileName": {"type": "string"},
                        "startLine": {"type": "integer"},
                        "endLine": {"type": "integer"},
                    },
                    "required": ["fileName"],
                },
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": GET_TOOL_DOCS,
                "description": "Return the expanded documentation for one tool's signature and parameters.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "server": {"type": "string"},
                        "tool": {"type": "string"},
                    },
                    "required": ["server", "tool"],
                },
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": EXECUTE_TOOL_CODE,
                "description": "Execute a short program that calls one or more tools and returns `result`.",
                "parameters": {
                    "type": "object",
                    "properties": {"code": {"type": "string"}},
                    "required": ["code"],
                },
            }
        }),
    ]
}
