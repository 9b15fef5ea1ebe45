//! Filter / Policy (spec §2 row 6, §4.4).
//!
//! Two overlapping filters compose in strict-narrowing order: the
//! per-client config (`toolsToExecute`/`toolsToAutoExecute`) is the sole
//! source for whether a tool may run at all or auto-run; a per-request
//! context may only restrict further, never expand beyond it.

use std::collections::HashSet;

use crate::connection_manager::ClientSnapshot;
use crate::registry::filter_list::NameFilter;
use crate::registry::naming::strip_client_prefix;

/// Per-request narrowing context (spec §4.4 "Per-request context").
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    /// `Unset` defaults to allow-all: omitting this filter must not
    /// restrict anything (spec §4.4 "clients default to allow-all when nil").
    pub include_clients: NameFilter,
    /// `Unset` defaults to deny-all, matching the tool-level default
    /// (spec §4.4 "tools default to deny-all when nil").
    pub include_tools: NameFilter,
}

impl RequestFilter {
    pub fn unrestricted() -> Self {
        Self {
            include_clients: NameFilter::all(),
            include_tools: NameFilter::all(),
        }
    }
}

/// Visibility per spec §4.4: whether a tool may be executed at all (not
/// necessarily auto-executed). `unprefixed_tool_name` must already have the
/// client-name prefix stripped (spec §4.4 "matching is done after stripping
/// the client-name prefix").
pub fn is_visible(snapshot: &ClientSnapshot, unprefixed_tool_name: &str, request: &RequestFilter) -> bool {
    if !snapshot.tools_to_execute.allows(unprefixed_tool_name, false) {
        return false;
    }
    if !request.include_clients.allows(&snapshot.name, true) {
        return false;
    }
    if !request.include_tools.allows(unprefixed_tool_name, false) {
        return false;
    }
    true
}

/// Whether a tool is eligible to run without human approval (spec §4.7
/// step 2, "Any other tool" branch): visible AND listed under the
/// auto-execute allow-list.
pub fn is_auto_executable(snapshot: &ClientSnapshot, unprefixed_tool_name: &str, request: &RequestFilter) -> bool {
    is_visible(snapshot, unprefixed_tool_name, request)
        && snapshot.tools_to_auto_execute.allows(unprefixed_tool_name, false)
}

/// All (prefixed_name, schema) pairs visible across every connected client
/// under the given request filter, used by enrichment (§4.9) and the
/// sandbox's listToolFiles/getToolDocs meta-tools (§4.8).
pub fn visible_tools(snapshots: &[ClientSnapshot], request: &RequestFilter) -> Vec<(String, serde_json::Value)> {
    let mut out = Vec::new();
    for snap in snapshots {
        if !snap.connected {
            continue;
        }
        if !request.include_clients.allows(&snap.name, true) {
            continue;
        }
        for (prefixed, schema) in &snap.tool_map {
            let Some(unprefixed) = strip_client_prefix(&snap.name, prefixed) else {
                continue;
            };
            if is_visible(snap, unprefixed, request) {
                out.push((prefixed.clone(), schema.clone()));
            }
        }
    }
    out
}

const FOREIGN_TOOL_INFIX: &str = "mcp__";

/// Integration-aware duplicate check (spec §4.4): a tool already present in
/// the request is never re-added. Additionally, `mcp__<foreign>__<toolName>`
/// is treated as a duplicate of any existing tool literally named
/// `<toolName>`.
pub fn is_duplicate(existing_names: &HashSet<String>, candidate_name: &str) -> bool {
    if existing_names.contains(candidate_name) {
        return true;
    }
    if let Some(rest) = candidate_name.strip_prefix(FOREIGN_TOOL_INFIX) {
        if let Some((_foreign, tool)) = rest.split_once("__") {
            return existing_names.contains(tool);
        }
    }
    false
}
