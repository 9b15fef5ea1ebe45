//! Static tool-call extraction for the executeCode auto-execute gate
//! (spec §4.7 step 2, §4.8).
//!
//! A regex-based extractor, not a parser: the interpreter in
//! [`crate::sandbox::interpreter`] is the actual execution engine, but the
//! auto-execute decision needs to happen *before* running anything, so it
//! works off the same lightweight pattern the rest of the sandbox's static
//! analysis uses (spec's own Open Question resolution: keep regex-based,
//! don't upgrade to a full AST).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::connection_manager::ClientSnapshot;
use crate::registry::filter_list::NameFilter;
use crate::sandbox::stub::to_snake_case;

static CALL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:await\s+)?([A-Za-z_][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\s*\(").unwrap());

/// Extract every `<ident>.<ident>(` call site (`server`, `tool`) in source
/// order, optionally preceded by `await`.
pub fn extract_calls(code: &str) -> Vec<(String, String)> {
    CALL_PATTERN
        .captures_iter(code)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Whether every extracted call in `code` is allowed to auto-execute
/// (spec §4.7 step 2 executeCode branch, §4.8 static validation).
pub fn is_auto_executable(code: &str, snapshots: &[ClientSnapshot]) -> bool {
    extract_calls(code).iter().all(|(server, tool)| match snapshots.iter().find(|s| &s.name == server) {
        // Unknown identifier: not a registered client, so the sandbox will
        // fail at runtime if it's not a language built-in. Spec: "treat as
        // allowed" for the purposes of THIS gate.
        None => true,
        Some(snapshot) => allow_list_permits(&snapshot.tools_to_auto_execute, tool),
    })
}

fn allow_list_permits(filter: &NameFilter, tool_ident: &str) -> bool {
    match filter {
        NameFilter::Unset => false,
        NameFilter::List(list) => {
            if list.is_empty() {
                false
            } else if list.iter().any(|n| n == "*") {
                true
            } else {
                // "projected through the sanitization used when binding":
                // the allow-list is expressed in original MCP tool names,
                // the extracted identifier is the snake_case bound name.
                list.iter().any(|n| to_snake_case(n) == tool_ident)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn snapshot(name: &str, auto: NameFilter) -> ClientSnapshot {
        ClientSnapshot {
            id: name.to_string(),
            name: name.to_string(),
            tool_map: HashMap::new(),
            name_mapping: HashMap::new(),
            tools_to_execute: NameFilter::all(),
            tools_to_auto_execute: auto,
            is_code_mode_client: true,
            connected: true,
            conn: None as Option<Arc<dyn crate::transport::McpTransport>>,
        }
    }

    #[test]
    fn extracts_simple_dotted_call() {
        let calls = extract_calls("def main():\n  return calc.add(x=1, y=2)\nresult = main()");
        assert_eq!(calls, vec![("calc".to_string(), "add".to_string())]);
    }

    #[test]
    fn extracts_awaited_call() {
        let calls = extract_calls("result = await calc.add(x=1, y=2)");
        assert_eq!(calls, vec![("calc".to_string(), "add".to_string())]);
    }

    #[test]
    fn auto_executable_when_tool_listed() {
        let snapshots = vec![snapshot("calc", NameFilter::named(["add"]))];
        assert!(is_auto_executable("calc.add(x=1, y=2)", &snapshots));
    }

    #[test]
    fn not_auto_executable_when_tool_absent() {
        let snapshots = vec![snapshot("calc", NameFilter::named(["add"]))];
        assert!(!is_auto_executable("calc.subtract(x=1, y=2)", &snapshots));
    }

    #[test]
    fn unregistered_server_treated_as_allowed() {
        let snapshots = vec![snapshot("calc", NameFilter::named(["add"]))];
        assert!(is_auto_executable("math.sqrt(x=4)", &snapshots));
    }

    #[test]
    fn star_allow_list_permits_any_tool() {
        let snapshots = vec![snapshot("calc", NameFilter::all())];
        assert!(is_auto_executable("calc.anything(x=1)", &snapshots));
    }
}
