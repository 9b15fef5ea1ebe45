//! Connection Manager (spec §2 row 3, §4.1).
//!
//! Owns the client registry lock and every piece of transport lifecycle:
//! Add/Remove/Reconnect/Edit/RegisterLocalTool. Network I/O always happens
//! outside the lock (spec §5): look-ups copy what's needed and release the
//! lock before the transport call, then a second short write reacquires it
//! to record the outcome.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::oneshot;

use crate::config::SharedConfig;
use crate::error::{McpCoreError, TransportStartupError, ValidationError};
use crate::local_tool_server::{LocalToolHandler, LocalToolServer};
use crate::registry::client_state::{
    CancelHandle, ClientEdit, ClientId, ClientState, ConnectionConfig, ConnectionLifecycle,
    ConnectionType, ToolSyncOverride, INTERNAL_CLIENT_ID,
};
use crate::registry::filter_list::NameFilter;
use crate::registry::naming::{prefixed_name, sanitize_tool_name, validate_client_name};
use crate::registry::schema::{build_tool_schema, rename_function};
use crate::schema_cache::SchemaCache;
use crate::transport::{
    HttpTransport, InProcessTransport, McpTransport, SseTransport, StdioTransport,
};
use crate::{health, tool_sync};

const PROTOCOL_VERSION: &str = "2024-11-05";
const CLIENT_NAME: &str = "mcp-core";
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Read-only snapshot of one client, safe to hold across an `.await` point
/// without keeping the registry lock (spec §5).
#[derive(Clone)]
pub struct ClientSnapshot {
    pub id: ClientId,
    pub name: String,
    pub tool_map: HashMap<String, Value>,
    pub name_mapping: HashMap<String, String>,
    pub tools_to_execute: NameFilter,
    pub tools_to_auto_execute: NameFilter,
    pub is_code_mode_client: bool,
    pub connected: bool,
    pub conn: Option<Arc<dyn McpTransport>>,
}

pub struct ConnectionManager {
    state: RwLock<HashMap<ClientId, ClientState>>,
    config: SharedConfig,
    local_server: RwLock<Option<Arc<LocalToolServer>>>,
    schema_cache: SchemaCache,
}

impl ConnectionManager {
    pub fn new(config: SharedConfig) -> Arc<Self> {
        Arc::new(Self {
            state: RwLock::new(HashMap::new()),
            config,
            local_server: RwLock::new(None),
            schema_cache: SchemaCache::new(),
        })
    }

    /// On-demand re-list for one client, read-through a TTL cache (spec §3)
    /// so a burst of callers wanting a fresher view than the last Tool Sync
    /// tick collapses to one live call per TTL window. Tool Sync's own
    /// ticker ignores this cache entirely and remains the source of truth;
    /// a hit or miss here never blocks or replaces its next scheduled tick.
    pub async fn list_tools_cached(&self, id: &str) -> Option<(HashMap<String, Value>, HashMap<String, String>)> {
        if let Some(hit) = self.schema_cache.get(id) {
            return Some(hit);
        }
        let transport = self.transport_for(id)?;
        let name = self.client_name(id)?;
        let timeout = self.tool_sync_timeout();
        let raw_tools = tokio::time::timeout(timeout, transport.list_tools()).await.ok()?.ok()?;
        let (tool_map, name_mapping) = build_tool_map(&name, &raw_tools).ok()?;
        self.schema_cache.put(id, tool_map.clone(), name_mapping.clone());
        Some((tool_map, name_mapping))
    }

    pub fn config(&self) -> SharedConfig {
        self.config.clone()
    }

    // -- Add -----------------------------------------------------------

    /// Spec §4.1 `Add`.
    pub async fn add(self: &Arc<Self>, id: ClientId, config: ConnectionConfig) -> Result<(), McpCoreError> {
        validate_client_name(&config.name)?;
        {
            let guard = self.state.read();
            if guard.contains_key(&id) {
                return Err(ValidationError::DuplicateClientId(id).into());
            }
        }
        {
            let mut guard = self.state.write();
            guard.insert(id.clone(), ClientState::placeholder(id.clone(), config.clone()));
        }

        match self.connect(&id, &config).await {
            Ok((transport, cancel, tool_map, name_mapping)) => {
                let mut guard = self.state.write();
                if let Some(state) = guard.get_mut(&id) {
                    state.conn = Some(transport);
                    state.cancel = cancel;
                    state.tool_map = tool_map;
                    state.name_mapping = name_mapping;
                    state.lifecycle = ConnectionLifecycle::Connected;
                    state.consecutive_failures = 0;
                }
                drop(guard);
                self.start_monitors(&id);
                Ok(())
            }
            Err(e) => {
                self.state.write().remove(&id);
                Err(e)
            }
        }
    }

    fn start_monitors(self: &Arc<Self>, id: &ClientId) {
        let health_task = health::spawn(Arc::clone(self), id.clone());
        let sync_task = if id != INTERNAL_CLIENT_ID {
            Some(tool_sync::spawn(Arc::clone(self), id.clone()))
        } else {
            None
        };
        let mut guard = self.state.write();
        if let Some(state) = guard.get_mut(id) {
            state.health_task = Some(health_task);
            state.sync_task = sync_task;
        }
    }

    /// Open the transport, initialize it, and list its tools. Does not
    /// touch the registry; callers record the result themselves.
    async fn connect(
        &self,
        id: &ClientId,
        config: &ConnectionConfig,
    ) -> Result<
        (
            Arc<dyn McpTransport>,
            Option<CancelHandle>,
            HashMap<String, Value>,
            HashMap<String, String>,
        ),
        McpCoreError,
    > {
        let timeout = Duration::from_secs(self.config.get().call_timeout_secs);
        let transport = self.build_transport(config).await?;

        tokio::time::timeout(timeout, transport.start())
            .await
            .map_err(|_| TransportStartupError::Timeout(config.name.clone(), timeout.as_secs()))?
            .map_err(|e| TransportStartupError::StartFailed(config.name.clone(), e.to_string()))?;

        let init_params = crate::transport::InitializeParams {
            protocol_version: PROTOCOL_VERSION.to_string(),
            client_name: CLIENT_NAME.to_string(),
            client_version: CLIENT_VERSION.to_string(),
        };
        tokio::time::timeout(timeout, transport.initialize(init_params))
            .await
            .map_err(|_| TransportStartupError::Timeout(config.name.clone(), timeout.as_secs()))?
            .map_err(|e| TransportStartupError::InitializeFailed(config.name.clone(), e.to_string()))?;

        // "Transport-list-tools failures at connect-time are logged and
        // treated as an empty tool set (connection still succeeds)" (§4.1).
        let raw_tools = match tokio::time::timeout(timeout, transport.list_tools()).await {
            Ok(Ok(tools)) => tools,
            Ok(Err(e)) => {
                log::warn!("list-tools failed during connect for client '{}': {e}", config.name);
                Vec::new()
            }
            Err(_) => {
                log::warn!("list-tools timed out during connect for client '{}'", config.name);
                Vec::new()
            }
        };

        let (tool_map, name_mapping) = build_tool_map(&config.name, &raw_tools)?;

        let cancel = match config.connection_type {
            ConnectionType::Stdio | ConnectionType::Sse => {
                let (tx, rx) = oneshot::channel();
                let long_lived = Arc::clone(&transport);
                let client_name = config.name.clone();
                tokio::spawn(async move {
                    let _ = rx.await;
                    let _ = long_lived.close().await;
                    log::info!("long-lived transport context for '{client_name}' torn down");
                });
                Some(CancelHandle(tx))
            }
            ConnectionType::Http | ConnectionType::InProcess => None,
        };

        Ok((transport, cancel, tool_map, name_mapping))
    }

    async fn build_transport(&self, config: &ConnectionConfig) -> Result<Arc<dyn McpTransport>, McpCoreError> {
        match config.connection_type {
            ConnectionType::Http => {
                let url = config.connection_string.clone().ok_or_else(|| {
                    ValidationError::InvalidClientName(config.name.clone(), "HTTP client requires a connection string")
                })?;
                Ok(Arc::new(HttpTransport::new(url, true, config.headers_provider.clone())))
            }
            ConnectionType::Sse => {
                let url = config.connection_string.clone().ok_or_else(|| {
                    ValidationError::InvalidClientName(config.name.clone(), "SSE client requires a connection string")
                })?;
                Ok(Arc::new(SseTransport::new(url, config.headers_provider.clone())))
            }
            ConnectionType::Stdio => {
                let stdio = config.stdio.clone().ok_or_else(|| {
                    ValidationError::InvalidClientName(config.name.clone(), "stdio client requires a command")
                })?;
                let mut env_vars = HashMap::new();
                for name in &stdio.required_env {
                    let value = env::var(name)
                        .map_err(|_| ValidationError::MissingEnvVar(name.clone()))?;
                    env_vars.insert(name.clone(), value);
                }
                Ok(Arc::new(StdioTransport::new(stdio.command, stdio.args, env_vars)))
            }
            ConnectionType::InProcess => {
                let server = if let Some(server) = &config.in_process_server {
                    Arc::clone(server)
                } else {
                    self.local_server_or_create() as Arc<dyn crate::transport::InProcessServer>
                };
                Ok(Arc::new(InProcessTransport::new(server)))
            }
        }
    }

    fn local_server_or_create(&self) -> Arc<LocalToolServer> {
        let mut guard = self.local_server.write();
        if let Some(server) = guard.as_ref() {
            return Arc::clone(server);
        }
        let server = Arc::new(LocalToolServer::new());
        *guard = Some(Arc::clone(&server));
        server
    }

    // -- Remove ----------------------------------------------------------

    /// Spec §4.1 `Remove`.
    pub async fn remove(&self, id: &str) -> Result<(), McpCoreError> {
        let (conn, cancel) = {
            let mut guard = self.state.write();
            let mut state = guard
                .remove(id)
                .ok_or_else(|| TransportStartupError::ClientNotFound(id.to_string()))?;
            state.stop_tasks();
            (state.conn, state.cancel)
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(conn) = conn {
            let _ = conn.close().await;
        }
        self.schema_cache.invalidate(id);
        Ok(())
    }

    // -- Reconnect ---------------------------------------------------------

    /// Spec §4.1 `Reconnect`: "re-invoke the connect routine (which itself
    /// tears down any prior connection for that ID)".
    pub async fn reconnect(self: &Arc<Self>, id: &str) -> Result<(), McpCoreError> {
        let config = {
            let guard = self.state.read();
            guard
                .get(id)
                .map(|s| s.config.clone())
                .ok_or_else(|| TransportStartupError::ClientNotFound(id.to_string()))?
        };
        let _ = self.remove(id).await;
        self.add(id.to_string(), config).await
    }

    // -- Edit --------------------------------------------------------------

    /// Spec §4.1 `Edit`: forbids changing transport-identity fields; allows
    /// name, headers, filters, code-mode flag. Rewrites every prefixed tool
    /// name and schema on rename.
    pub fn edit(&self, id: &str, edit: ClientEdit) -> Result<(), McpCoreError> {
        let mut guard = self.state.write();
        let state = guard
            .get_mut(id)
            .ok_or_else(|| TransportStartupError::ClientNotFound(id.to_string()))?;

        if let Some(new_name) = edit.name {
            validate_client_name(&new_name)?;
            let old_name = state.config.name.clone();
            let mut new_tool_map = HashMap::with_capacity(state.tool_map.len());
            for (old_prefixed, mut schema) in std::mem::take(&mut state.tool_map) {
                let tool_suffix = old_prefixed
                    .strip_prefix(&format!("{old_name}-"))
                    .unwrap_or(&old_prefixed)
                    .to_string();
                let new_prefixed = prefixed_name(&new_name, &tool_suffix);
                rename_function(&mut schema, &new_prefixed);
                new_tool_map.insert(new_prefixed, schema);
            }
            state.tool_map = new_tool_map;
            state.config.name = new_name;
        }
        if let Some(headers_provider) = edit.headers_provider {
            state.config.headers_provider = Some(headers_provider);
        }
        if let Some(filter) = edit.tools_to_execute {
            state.config.tools_to_execute = filter;
        }
        if let Some(filter) = edit.tools_to_auto_execute {
            state.config.tools_to_auto_execute = filter;
        }
        if let Some(is_code_mode) = edit.is_code_mode_client {
            state.config.is_code_mode_client = is_code_mode;
        }
        Ok(())
    }

    // -- RegisterLocalTool --------------------------------------------------

    /// Spec §4.1 `RegisterLocalTool`.
    pub async fn register_local_tool(
        self: &Arc<Self>,
        name: &str,
        description: &str,
        parameters: Value,
        handler: LocalToolHandler,
    ) -> Result<(), McpCoreError> {
        if name.contains('-') || name.contains(' ') || name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(ValidationError::InvalidToolName(
                name.to_string(),
                "must not contain hyphens, spaces, or start with a digit",
            )
            .into());
        }

        let server = self.local_server_or_create();
        // Registered under its raw MCP name: `connect` -> `build_tool_map`
        // applies the single client-name prefix when this tool is listed,
        // the same as every other transport (spec §3, §4.1).
        let schema = build_tool_schema(name, Some(description), parameters);
        server
            .register(name, schema, handler)
            .map_err(|e| ValidationError::InvalidToolName(name.to_string(), Box::leak(e.to_string().into_boxed_str())))?;

        let exists = { self.state.read().contains_key(INTERNAL_CLIENT_ID) };
        if !exists {
            let mut config = ConnectionConfig::new(INTERNAL_CLIENT_ID, ConnectionType::InProcess);
            config.in_process_server = Some(server as Arc<dyn crate::transport::InProcessServer>);
            config.tools_to_execute = NameFilter::all();
            config.tools_to_auto_execute = NameFilter::all();
            self.add(INTERNAL_CLIENT_ID.to_string(), config).await?;
        } else {
            self.reconnect(INTERNAL_CLIENT_ID).await?;
        }
        Ok(())
    }

    // -- Read surface for policy / executor / sandbox / agent loop --------

    pub fn client_snapshot(&self, id: &str) -> Option<ClientSnapshot> {
        let guard = self.state.read();
        guard.get(id).map(snapshot_of)
    }

    pub fn all_snapshots(&self) -> Vec<ClientSnapshot> {
        self.state.read().values().map(snapshot_of).collect()
    }

    /// Find the client owning a prefixed tool name (spec §4.5 step 2).
    pub fn owner_of_prefixed_tool(&self, prefixed: &str) -> Option<ClientSnapshot> {
        let guard = self.state.read();
        guard
            .values()
            .find(|s| s.tool_map.contains_key(prefixed))
            .map(snapshot_of)
    }

    // -- Cleanup -------------------------------------------------------------

    /// Spec §5 Cleanup: idempotent, tears down every client.
    pub async fn cleanup(&self) {
        let ids: Vec<ClientId> = self.state.read().keys().cloned().collect();
        for id in ids {
            let _ = self.remove(&id).await;
        }
        *self.local_server.write() = None;
    }

    // -- Helpers used by health.rs / tool_sync.rs (pub(crate)) --------------

    pub(crate) fn transport_and_ping_flag(&self, id: &str) -> Option<(Arc<dyn McpTransport>, bool)> {
        let guard = self.state.read();
        let state = guard.get(id)?;
        Some((state.conn.clone()?, state.config.is_ping_available))
    }

    pub(crate) fn is_registered(&self, id: &str) -> bool {
        self.state.read().contains_key(id)
    }

    pub(crate) fn mark_health_success(&self, id: &str) {
        let mut guard = self.state.write();
        if let Some(state) = guard.get_mut(id) {
            if state.consecutive_failures > 0 {
                log::info!("client '{id}' liveness recovered");
            }
            state.consecutive_failures = 0;
            if state.lifecycle != ConnectionLifecycle::Connected {
                log::info!("client '{id}' transitioned to Connected");
                state.lifecycle = ConnectionLifecycle::Connected;
            }
        }
    }

    /// Returns true if this failure pushed the client past the threshold.
    pub(crate) fn mark_health_failure(&self, id: &str) -> bool {
        let threshold = self.config.get().max_consecutive_failures;
        let mut guard = self.state.write();
        let Some(state) = guard.get_mut(id) else {
            return false;
        };
        state.consecutive_failures += 1;
        if state.consecutive_failures >= threshold && state.lifecycle == ConnectionLifecycle::Connected {
            state.lifecycle = ConnectionLifecycle::Disconnected;
            log::info!("client '{id}' transitioned to Disconnected after {} failures", state.consecutive_failures);
            true
        } else {
            false
        }
    }

    pub(crate) fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.config.get().call_timeout_secs)
    }

    pub(crate) fn health_interval(&self) -> Duration {
        Duration::from_secs(self.config.get().health_check_interval_secs)
    }

    pub(crate) fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.config.get().health_check_timeout_secs)
    }

    pub(crate) fn tool_sync_timeout(&self) -> Duration {
        Duration::from_secs(self.config.get().tool_sync_timeout_secs)
    }

    /// Effective per-client sync interval, or `None` if disabled (spec §4.3).
    pub(crate) fn tool_sync_interval_for(&self, id: &str) -> Option<Duration> {
        let guard = self.state.read();
        let state = guard.get(id)?;
        match state.config.tool_sync_override {
            ToolSyncOverride::Disabled => None,
            ToolSyncOverride::UseGlobal => Some(Duration::from_secs(self.config.get().tool_sync_interval_secs)),
            ToolSyncOverride::Custom(secs) => Some(Duration::from_secs(secs)),
        }
    }

    pub(crate) fn client_name(&self, id: &str) -> Option<String> {
        self.state.read().get(id).map(|s| s.config.name.clone())
    }

    pub(crate) fn transport_for(&self, id: &str) -> Option<Arc<dyn McpTransport>> {
        self.state.read().get(id)?.conn.clone()
    }

    /// Atomically replace a client's tool map and name mapping (spec §4.3),
    /// returning `(old_count, new_count)` for the caller to log.
    pub(crate) fn apply_tool_sync(
        &self,
        id: &str,
        tool_map: HashMap<String, Value>,
        name_mapping: HashMap<String, String>,
    ) -> Option<(usize, usize)> {
        let mut guard = self.state.write();
        let state = guard.get_mut(id)?;
        let old_count = state.tool_map.len();
        let new_count = tool_map.len();
        state.tool_map = tool_map;
        state.name_mapping = name_mapping;
        Some((old_count, new_count))
    }
}

fn snapshot_of(state: &ClientState) -> ClientSnapshot {
    ClientSnapshot {
        id: state.id.clone(),
        name: state.config.name.clone(),
        tool_map: state.tool_map.clone(),
        name_mapping: state.name_mapping.clone(),
        tools_to_execute: state.config.tools_to_execute.clone(),
        tools_to_auto_execute: state.config.tools_to_auto_execute.clone(),
        is_code_mode_client: state.config.is_code_mode_client,
        connected: state.is_connected(),
        conn: state.conn.clone(),
    }
}

/// Build a client's `tool_map`/`name_mapping` from raw `{type, function}`
/// tool schemas returned by `list_tools` (spec §3 Tool schema, §4.1).
pub(crate) fn build_tool_map(
    client_name: &str,
    raw_tools: &[Value],
) -> Result<(HashMap<String, Value>, HashMap<String, String>), McpCoreError> {
    let mut tool_map = HashMap::new();
    let mut name_mapping = HashMap::new();
    for raw in raw_tools {
        let function = raw.get("function").cloned().unwrap_or(Value::Null);
        let mcp_name = function
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| McpCoreError::Internal(format!("tool from '{client_name}' missing function.name")))?
            .to_string();
        let description = function.get("description").and_then(Value::as_str);
        let parameters = function.get("parameters").cloned().unwrap_or_else(|| Value::Object(Default::default()));

        let prefixed = prefixed_name(client_name, &mcp_name);
        let sanitized = sanitize_tool_name(&prefixed)?;
        let schema = build_tool_schema(&prefixed, description, parameters);

        tool_map.insert(prefixed, schema);
        name_mapping.insert(sanitized, mcp_name);
    }
    Ok((tool_map, name_mapping))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SharedConfig;
    use crate::registry::client_state::ConnectionType;
    use serde_json::json;

    fn make_config(name: &str) -> ConnectionConfig {
        let mut c = ConnectionConfig::new(name, ConnectionType::InProcess);
        c.tools_to_execute = NameFilter::all();
        c.tools_to_auto_execute = NameFilter::all();
        c
    }

    #[tokio::test]
    async fn add_in_process_client_connects_and_lists_tools() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager.add("c1".to_string(), make_config("calc")).await.unwrap();
        let snap = manager.client_snapshot("c1").unwrap();
        assert!(snap.connected);
    }

    #[tokio::test]
    async fn add_rejects_duplicate_id() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager.add("c1".to_string(), make_config("calc")).await.unwrap();
        let err = manager.add("c1".to_string(), make_config("calc2")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn add_rejects_invalid_client_name() {
        let manager = ConnectionManager::new(SharedConfig::default());
        let err = manager.add("c1".to_string(), make_config("bad-name")).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn list_tools_cached_hits_transport_once_then_reads_cache() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager.add("c1".to_string(), make_config("calc")).await.unwrap();
        let (first, _) = manager.list_tools_cached("c1").await.unwrap();
        assert!(!first.is_empty());
        let (second, _) = manager.list_tools_cached("c1").await.unwrap();
        assert_eq!(first.len(), second.len());
    }

    #[tokio::test]
    async fn list_tools_cached_is_none_for_unregistered_client() {
        let manager = ConnectionManager::new(SharedConfig::default());
        assert!(manager.list_tools_cached("ghost").await.is_none());
    }

    #[tokio::test]
    async fn remove_invalidates_schema_cache() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager.add("c1".to_string(), make_config("calc")).await.unwrap();
        manager.list_tools_cached("c1").await.unwrap();
        manager.remove("c1").await.unwrap();
        assert!(manager.list_tools_cached("c1").await.is_none());
    }

    #[tokio::test]
    async fn remove_then_snapshot_is_none() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager.add("c1".to_string(), make_config("calc")).await.unwrap();
        manager.remove("c1").await.unwrap();
        assert!(manager.client_snapshot("c1").is_none());
    }

    #[tokio::test]
    async fn edit_rename_rewrites_tool_map_keys() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager.add("c1".to_string(), make_config("calc")).await.unwrap();
        {
            let mut guard = manager.state.write();
            let state = guard.get_mut("c1").unwrap();
            state.tool_map.insert(
                "calc-add".to_string(),
                json!({"type": "function", "function": {"name": "calc-add"}}),
            );
        }
        manager
            .edit(
                "c1",
                ClientEdit {
                    name: Some("calculator".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        let snap = manager.client_snapshot("c1").unwrap();
        assert!(snap.tool_map.contains_key("calculator-add"));
        assert_eq!(snap.tool_map["calculator-add"]["function"]["name"], "calculator-add");
    }

    #[tokio::test]
    async fn register_local_tool_then_execute_through_snapshot() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager
            .register_local_tool(
                "ping",
                "pings",
                json!({"type": "object"}),
                Arc::new(|_| Box::pin(async { Ok("pong".to_string()) })),
            )
            .await
            .unwrap();
        let snap = manager.client_snapshot(INTERNAL_CLIENT_ID).unwrap();
        assert!(snap.tool_map.contains_key(&format!("{INTERNAL_CLIENT_ID}-ping")));
    }
}
