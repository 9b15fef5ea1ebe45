//! Request-ID tree (spec component 11, §4.9).
//!
//! Every nested tool call gets its own request context with a fresh ID and
//! a link back to its parent, so a plugin pipeline or downstream tracing
//! system can reconstruct the call tree.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Caller-supplied unique ID generator (spec §6 `NewRequestIDFn`, optional).
pub trait RequestIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// A request context: the current request's ID, its parent's ID (if any),
/// and the original top-level request ID the whole turn started from.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub parent_request_id: Option<String>,
    pub original_request_id: String,
}

impl RequestContext {
    /// The context for a fresh top-level turn: its own ID is also the
    /// original-request-ID snapshot (spec §4.7 state).
    pub fn root(request_id: String) -> Self {
        Self {
            original_request_id: request_id.clone(),
            request_id,
            parent_request_id: None,
        }
    }

    /// Derive a child context for a tool call nested one level deeper
    /// (e.g. a sandbox-interpreter tool call), per spec §4.9: "records the
    /// parent request ID."
    pub fn child(&self, generator: Option<&dyn RequestIdGenerator>, tool_name: &str) -> Self {
        let request_id = match generator {
            Some(g) => g.next_id(),
            None => fallback_id(tool_name),
        };
        Self {
            request_id,
            parent_request_id: Some(self.request_id.clone()),
            original_request_id: self.original_request_id.clone(),
        }
    }
}

static FALLBACK_SEQ: AtomicU64 = AtomicU64::new(0);

/// `exec_<nanotime>_<toolName>`, used only when no generator is configured
/// (spec §4.9). A monotonic counter is folded in alongside wall-clock time
/// since two calls in the same tick must still get distinct IDs.
fn fallback_id(tool_name: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = FALLBACK_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("exec_{nanos}_{seq}_{tool_name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SeqGenerator(AtomicU64);

    impl RequestIdGenerator for SeqGenerator {
        fn next_id(&self) -> String {
            format!("gen-{}", self.0.fetch_add(1, Ordering::SeqCst))
        }
    }

    #[test]
    fn root_sets_original_and_request_id_equal() {
        let ctx = RequestContext::root("turn-1".into());
        assert_eq!(ctx.request_id, "turn-1");
        assert_eq!(ctx.original_request_id, "turn-1");
        assert!(ctx.parent_request_id.is_none());
    }

    #[test]
    fn child_preserves_original_and_links_parent() {
        let root = RequestContext::root("turn-1".into());
        let gen = SeqGenerator(AtomicU64::new(0));
        let child = root.child(Some(&gen), "add");
        assert_eq!(child.request_id, "gen-0");
        assert_eq!(child.parent_request_id.as_deref(), Some("turn-1"));
        assert_eq!(child.original_request_id, "turn-1");
    }

    #[test]
    fn child_falls_back_to_exec_prefixed_id_without_generator() {
        let root = RequestContext::root("turn-1".into());
        let child = root.child(None, "subtract");
        assert!(child.request_id.starts_with("exec_"));
        assert!(child.request_id.ends_with("_subtract"));
    }

    #[test]
    fn fallback_ids_are_unique_across_calls() {
        let root = RequestContext::root("turn-1".into());
        let a = root.child(None, "add");
        let b = root.child(None, "add");
        assert_ne!(a.request_id, b.request_id);
    }
}
