//! Health Monitor (spec §2 row 4, §4.2).
//!
//! One ticker task per client. Each tick issues a liveness check — `ping`
//! if the client supports it, else `list_tools` — bounded by a fixed
//! per-attempt timeout, and folds the outcome into the client's
//! consecutive-failure counter via [`ConnectionManager`].

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::connection_manager::ConnectionManager;
use crate::registry::client_state::ClientId;

/// Spawn the per-client health ticker. Stops itself once the client
/// disappears from the registry (spec §4.2: "If the client disappears from
/// the registry between checks, the monitor stops itself").
pub fn spawn(manager: Arc<ConnectionManager>, id: ClientId) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(manager.health_interval());
        ticker.tick().await; // first tick fires immediately; skip it

        loop {
            ticker.tick().await;
            if !manager.is_registered(&id) {
                log::debug!("health monitor for '{id}' stopping: client no longer registered");
                return;
            }

            if check_once(&manager, &id).await {
                log::debug!("client '{id}' liveness check ok");
                manager.mark_health_success(&id);
            } else {
                let disconnected = manager.mark_health_failure(&id);
                if disconnected {
                    log::info!("client '{id}' marked disconnected after repeated liveness failures");
                } else {
                    log::debug!("client '{id}' liveness check failed");
                }
            }
        }
    })
}

async fn check_once(manager: &ConnectionManager, id: &str) -> bool {
    let Some((transport, ping_available)) = manager.transport_and_ping_flag(id) else {
        return false;
    };
    let timeout = manager.health_timeout();

    let result = if ping_available {
        tokio::time::timeout(timeout, transport.ping()).await
    } else {
        tokio::time::timeout(timeout, transport.list_tools()).await.map(|r| r.map(|_| ()))
    };

    matches!(result, Ok(Ok(())))
}
