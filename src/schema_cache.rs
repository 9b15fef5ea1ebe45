//! Schema cache: a 5-minute TTL read-through cache of per-client tool
//! listings, keyed by client id.
//!
//! Tool Sync (§4.3) is the source of truth: its ticker unconditionally
//! replaces a client's tool map on every tick regardless of this cache. This
//! cache only sits in front of an on-demand re-list (e.g. a caller that
//! wants a fresher view than the last tick without forcing a full
//! reconnect), so a burst of such requests collapses to one live
//! `ListTools` call per TTL window per client instead of one per request.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;

const CACHE_TTL: Duration = Duration::from_secs(300);

struct CacheEntry {
    tool_map: HashMap<String, Value>,
    name_mapping: HashMap<String, String>,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= CACHE_TTL
    }
}

/// Per-client read-through cache of the last live `ListTools` result.
#[derive(Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Returns the cached (tool_map, name_mapping) for `id` if present and
    /// not yet expired.
    pub fn get(&self, id: &str) -> Option<(HashMap<String, Value>, HashMap<String, String>)> {
        let entries = self.entries.lock();
        let entry = entries.get(id)?;
        if entry.is_expired() {
            return None;
        }
        Some((entry.tool_map.clone(), entry.name_mapping.clone()))
    }

    pub fn put(&self, id: &str, tool_map: HashMap<String, Value>, name_mapping: HashMap<String, String>) {
        self.entries.lock().insert(
            id.to_string(),
            CacheEntry { tool_map, name_mapping, created_at: Instant::now() },
        );
    }

    /// Drop a client's cached entry, e.g. on disconnect or removal so a
    /// stale entry can't outlive the client it was fetched for.
    pub fn invalidate(&self, id: &str) {
        self.entries.lock().remove(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_entry_is_none() {
        let cache = SchemaCache::new();
        assert!(cache.get("c1").is_none());
    }

    #[test]
    fn fresh_entry_is_returned() {
        let cache = SchemaCache::new();
        cache.put("c1", HashMap::from([("calc-add".to_string(), serde_json::json!({}))]), HashMap::new());
        let (tool_map, _) = cache.get("c1").unwrap();
        assert!(tool_map.contains_key("calc-add"));
    }

    #[test]
    fn invalidate_drops_the_entry() {
        let cache = SchemaCache::new();
        cache.put("c1", HashMap::new(), HashMap::new());
        cache.invalidate("c1");
        assert!(cache.get("c1").is_none());
    }

    #[test]
    fn expired_entry_is_treated_as_absent() {
        let cache = SchemaCache::new();
        cache.entries.lock().insert(
            "c1".to_string(),
            CacheEntry {
                tool_map: HashMap::new(),
                name_mapping: HashMap::new(),
                created_at: Instant::now() - Duration::from_secs(301),
            },
        );
        assert!(cache.get("c1").is_none());
    }
}
