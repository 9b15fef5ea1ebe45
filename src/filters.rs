//! Tool filters (SPEC_FULL.md §3): allow/block-list and predicate-based
//! convenience constructors a caller can layer on top of a
//! [`crate::policy::RequestFilter`] when narrowing the tool list it hands to
//! an LLM, e.g. after calling [`crate::policy::visible_tools`].
//!
//! These are building blocks, not a second policy engine: [`crate::policy`]
//! remains the sole authority over what may execute or auto-execute. A
//! filter built here only trims the list a caller presents to its model; it
//! has no bearing on what [`crate::executor::ToolExecutor`] will accept.

use std::collections::HashSet;

use serde_json::Value;

/// Context handed to a [`DynamicToolFilter`]. Carries only the server name
/// and an opaque caller-supplied context value — this crate has no
/// agent/crew concept to pass through alongside them.
#[derive(Debug, Clone)]
pub struct ToolFilterContext {
    pub server_name: String,
    pub run_context: Option<Value>,
}

impl ToolFilterContext {
    pub fn new(server_name: impl Into<String>, run_context: Option<Value>) -> Self {
        Self { server_name: server_name.into(), run_context }
    }
}

/// A filter over one (tool name, schema) pair.
pub type ToolFilter = Box<dyn Fn(&str, &Value) -> bool + Send + Sync>;

/// A filter over one (tool name, schema) pair with request context.
pub type DynamicToolFilter = Box<dyn Fn(&ToolFilterContext, &str, &Value) -> bool + Send + Sync>;

/// Static allow/block-list filter over tool names.
///
/// Blocked names take precedence over the allow list. An empty allow list
/// means "no restriction" rather than "allow nothing" — mirrors
/// [`crate::registry::filter_list::NameFilter`]'s empty-list semantics, not
/// its `Unset` (deny-all) semantics, since a caller reaching for this type
/// has already decided it wants a list-based filter.
#[derive(Debug, Clone, Default)]
pub struct StaticToolFilter {
    allowed_tool_names: HashSet<String>,
    blocked_tool_names: HashSet<String>,
}

impl StaticToolFilter {
    pub fn new(allowed_tool_names: Option<Vec<String>>, blocked_tool_names: Option<Vec<String>>) -> Self {
        Self {
            allowed_tool_names: allowed_tool_names.unwrap_or_default().into_iter().collect(),
            blocked_tool_names: blocked_tool_names.unwrap_or_default().into_iter().collect(),
        }
    }

    pub fn allows(&self, tool_name: &str) -> bool {
        if self.blocked_tool_names.contains(tool_name) {
            return false;
        }
        if !self.allowed_tool_names.is_empty() {
            return self.allowed_tool_names.contains(tool_name);
        }
        true
    }

    pub fn into_tool_filter(self) -> ToolFilter {
        Box::new(move |name: &str, _schema: &Value| self.allows(name))
    }
}

/// Build a [`ToolFilter`] closure from an allow/block-list pair.
pub fn create_static_tool_filter(
    allowed_tool_names: Option<Vec<String>>,
    blocked_tool_names: Option<Vec<String>>,
) -> ToolFilter {
    StaticToolFilter::new(allowed_tool_names, blocked_tool_names).into_tool_filter()
}

/// Wrap a predicate as a [`DynamicToolFilter`].
pub fn create_dynamic_tool_filter<F>(filter_func: F) -> DynamicToolFilter
where
    F: Fn(&ToolFilterContext, &str, &Value) -> bool + Send + Sync + 'static,
{
    Box::new(filter_func)
}

/// Apply a [`ToolFilter`] over a `visible_tools`-shaped list, keeping the
/// prefixed name as-is (the filter closure decides by name, not prefix).
pub fn apply_static(tools: Vec<(String, Value)>, filter: &ToolFilter) -> Vec<(String, Value)> {
    tools.into_iter().filter(|(name, schema)| filter(name, schema)).collect()
}

/// Apply a [`DynamicToolFilter`] over a `visible_tools`-shaped list under one
/// shared context.
pub fn apply_dynamic(
    tools: Vec<(String, Value)>,
    ctx: &ToolFilterContext,
    filter: &DynamicToolFilter,
) -> Vec<(String, Value)> {
    tools.into_iter().filter(|(name, schema)| filter(ctx, name, schema)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tools() -> Vec<(String, Value)> {
        vec![
            ("calc-add".to_string(), json!({})),
            ("calc-subtract".to_string(), json!({})),
            ("calc-divide".to_string(), json!({})),
        ]
    }

    #[test]
    fn static_filter_empty_allow_list_permits_all_unless_blocked() {
        let filter = StaticToolFilter::new(None, Some(vec!["calc-divide".to_string()]));
        assert!(filter.allows("calc-add"));
        assert!(!filter.allows("calc-divide"));
    }

    #[test]
    fn static_filter_allow_list_restricts_to_named_tools() {
        let filter = StaticToolFilter::new(Some(vec!["calc-add".to_string()]), None);
        assert!(filter.allows("calc-add"));
        assert!(!filter.allows("calc-subtract"));
    }

    #[test]
    fn blocked_takes_precedence_over_allowed() {
        let filter = StaticToolFilter::new(
            Some(vec!["calc-add".to_string()]),
            Some(vec!["calc-add".to_string()]),
        );
        assert!(!filter.allows("calc-add"));
    }

    #[test]
    fn apply_static_narrows_visible_tools_list() {
        let filter = create_static_tool_filter(None, Some(vec!["calc-divide".to_string()]));
        let narrowed = apply_static(tools(), &filter);
        assert_eq!(narrowed.len(), 2);
        assert!(narrowed.iter().all(|(name, _)| name != "calc-divide"));
    }

    #[test]
    fn dynamic_filter_sees_context_and_schema() {
        let filter = create_dynamic_tool_filter(|ctx: &ToolFilterContext, name: &str, _schema: &Value| {
            ctx.server_name == "calc" && name != "calc-divide"
        });
        let ctx = ToolFilterContext::new("calc", None);
        let narrowed = apply_dynamic(tools(), &ctx, &filter);
        assert_eq!(narrowed.len(), 2);
    }
}
