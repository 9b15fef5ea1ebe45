//! Tool Sync (spec §2 row 5, §4.3).
//!
//! One ticker task per non-internal client. Each tick re-lists the
//! client's tools with a bounded timeout; on success the tool map and name
//! mapping are atomically replaced, on failure the prior map is preserved.
//! No registry lock is held across the network call.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::connection_manager::{build_tool_map, ConnectionManager};
use crate::registry::client_state::ClientId;

/// Spawn the per-client tool-sync ticker, or return immediately (no task
/// scheduled, caller stores `None`) if syncing is disabled for this client.
pub fn spawn(manager: Arc<ConnectionManager>, id: ClientId) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let Some(interval) = manager.tool_sync_interval_for(&id) else {
                log::debug!("tool sync for '{id}' disabled, stopping");
                return;
            };
            tokio::time::sleep(interval).await;

            if !manager.is_registered(&id) {
                log::debug!("tool sync for '{id}' stopping: client no longer registered");
                return;
            }

            sync_once(&manager, &id).await;
        }
    })
}

async fn sync_once(manager: &ConnectionManager, id: &str) {
    let Some(transport) = manager.transport_for(id) else {
        return;
    };
    let Some(name) = manager.client_name(id) else {
        return;
    };
    let timeout = manager.tool_sync_timeout();

    match tokio::time::timeout(timeout, transport.list_tools()).await {
        Ok(Ok(raw_tools)) => match build_tool_map(&name, &raw_tools) {
            Ok((tool_map, name_mapping)) => {
                if let Some((old_count, new_count)) = manager.apply_tool_sync(id, tool_map, name_mapping) {
                    log::info!("tool sync for '{name}': {old_count} -> {new_count} tools");
                }
            }
            Err(e) => log::warn!("tool sync for '{name}' produced an invalid schema, keeping prior tools: {e}"),
        },
        Ok(Err(e)) => log::warn!("tool sync for '{name}' failed, keeping prior tools: {e}"),
        Err(_) => log::warn!("tool sync for '{name}' timed out, keeping prior tools"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedConfig;
    use crate::registry::client_state::{ConnectionConfig, ConnectionType};
    use crate::registry::filter_list::NameFilter;

    fn config(name: &str) -> ConnectionConfig {
        let mut c = ConnectionConfig::new(name, ConnectionType::InProcess);
        c.tools_to_execute = NameFilter::all();
        c.tools_to_auto_execute = NameFilter::all();
        c
    }

    #[tokio::test]
    async fn sync_once_preserves_tools_on_missing_transport() {
        let manager = ConnectionManager::new(SharedConfig::default());
        // unregistered client: transport_for returns None, sync_once is a no-op
        sync_once(&manager, "ghost").await;
    }

    #[tokio::test]
    async fn sync_once_replaces_tool_map_from_live_transport() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager.add("c1".to_string(), config("calc")).await.unwrap();
        let before = manager.client_snapshot("c1").unwrap().tool_map.len();
        sync_once(&manager, "c1").await;
        let after = manager.client_snapshot("c1").unwrap().tool_map.len();
        assert_eq!(before, after);
    }
}
