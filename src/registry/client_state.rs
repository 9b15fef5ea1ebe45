//! Per-client connection state (spec §3 `ClientState`).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::oauth::OAuth2Provider;
use crate::registry::filter_list::NameFilter;
use crate::transport::{HeadersProvider, InProcessServer, McpTransport};

/// Opaque client identifier. Distinct from [`ClientName`] so a client can be
/// renamed (`ConnectionManager::edit`) without invalidating references held
/// by the request-ID tree or cumulative agent-loop result lists.
pub type ClientId = String;

/// Reserved client ID for the lazily-created internal/local-tool server
/// (spec §4.1 `RegisterLocalTool`, §5 "internal client sits in the registry
/// under a reserved ID").
pub const INTERNAL_CLIENT_ID: &str = "__internal__";

/// The four transport kinds a connection may use (spec §2 row 2, §4.1 table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionType {
    Http,
    Sse,
    Stdio,
    InProcess,
}

/// Live/placeholder connection lifecycle state (spec §3 Lifecycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLifecycle {
    Connected,
    Disconnected,
}

/// Subprocess launch parameters for a `Stdio` connection.
#[derive(Clone)]
pub struct StdioConfig {
    pub command: String,
    pub args: Vec<String>,
    /// Names of environment variables the process requires; each must be
    /// present in the manager's own environment before spawn (spec §4.1
    /// table, §5 Resource policy).
    pub required_env: Vec<String>,
}

/// How often a client's tools should be re-synced, overriding the global
/// default (spec §3 `toolSyncInterval`, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSyncOverride {
    /// Negative in the source: disable syncing for this client.
    Disabled,
    /// Zero in the source: use the manager's global interval.
    UseGlobal,
    /// Positive in the source: use this many seconds.
    Custom(u64),
}

impl ToolSyncOverride {
    /// Parse the signed-integer encoding used by the source config format.
    pub fn from_seconds_signed(value: i64) -> Self {
        if value < 0 {
            ToolSyncOverride::Disabled
        } else if value == 0 {
            ToolSyncOverride::UseGlobal
        } else {
            ToolSyncOverride::Custom(value as u64)
        }
    }
}

/// Immutable-after-creation connection configuration plus the mutable
/// policy fields `Edit` is allowed to change (spec §4.1 `Edit`).
#[derive(Clone)]
pub struct ConnectionConfig {
    pub name: String,
    pub connection_type: ConnectionType,
    pub connection_string: Option<String>,
    pub stdio: Option<StdioConfig>,
    pub in_process_server: Option<Arc<dyn InProcessServer>>,
    pub headers_provider: Option<Arc<dyn HeadersProvider>>,
    pub oauth: Option<Arc<dyn OAuth2Provider>>,
    pub tools_to_execute: NameFilter,
    pub tools_to_auto_execute: NameFilter,
    pub is_code_mode_client: bool,
    pub is_ping_available: bool,
    pub tool_sync_override: ToolSyncOverride,
}

impl ConnectionConfig {
    pub fn new(name: impl Into<String>, connection_type: ConnectionType) -> Self {
        Self {
            name: name.into(),
            connection_type,
            connection_string: None,
            stdio: None,
            in_process_server: None,
            headers_provider: None,
            oauth: None,
            tools_to_execute: NameFilter::Unset,
            tools_to_auto_execute: NameFilter::Unset,
            is_code_mode_client: false,
            is_ping_available: false,
            tool_sync_override: ToolSyncOverride::UseGlobal,
        }
    }

    /// Tool-execute visibility per spec §4.4: `nil` denies everything.
    pub fn allows_execute(&self, unprefixed_tool_name: &str) -> bool {
        self.tools_to_execute.allows(unprefixed_tool_name, false)
    }

    /// Auto-execute eligibility per spec §4.4: `nil` denies everything.
    pub fn allows_auto_execute(&self, unprefixed_tool_name: &str) -> bool {
        self.tools_to_auto_execute
            .allows(unprefixed_tool_name, false)
    }
}

/// Fields `ConnectionManager::edit` is permitted to change in place without
/// tearing down the connection (spec §4.1 `Edit`).
#[derive(Default)]
pub struct ClientEdit {
    pub name: Option<String>,
    pub headers_provider: Option<Arc<dyn HeadersProvider>>,
    pub tools_to_execute: Option<NameFilter>,
    pub tools_to_auto_execute: Option<NameFilter>,
    pub is_code_mode_client: Option<bool>,
}

/// Cancellation handle for a long-lived transport context (Stdio/SSE).
///
/// Holding the sender keeps the associated receiver alive; dropping it (or
/// sending through it) signals the background task owning the subprocess
/// or stream to tear down.
pub struct CancelHandle(pub oneshot::Sender<()>);

impl CancelHandle {
    pub fn cancel(self) {
        let _ = self.0.send(());
    }
}

/// One configured MCP tool server as seen from the core (spec §3 `ClientState`).
pub struct ClientState {
    pub id: ClientId,
    pub config: ConnectionConfig,
    pub conn: Option<Arc<dyn McpTransport>>,
    pub lifecycle: ConnectionLifecycle,
    pub cancel: Option<CancelHandle>,
    /// Prefixed tool name -> tool schema (`{type: "function", function: {...}}`).
    pub tool_map: HashMap<String, Value>,
    /// Sanitized name -> original MCP tool name.
    pub name_mapping: HashMap<String, String>,
    /// Consecutive liveness-check failures (spec §4.2).
    pub consecutive_failures: u32,
    /// Background ticker tasks started alongside this client (health monitor,
    /// tool syncer); aborted on removal (spec §4.1 `Remove`, §5 Cleanup).
    pub health_task: Option<tokio::task::JoinHandle<()>>,
    pub sync_task: Option<tokio::task::JoinHandle<()>>,
}

impl ClientState {
    /// Create a placeholder state before the transport has been started
    /// (spec §3 Lifecycle: "ClientState is created in placeholder form").
    pub fn placeholder(id: ClientId, config: ConnectionConfig) -> Self {
        Self {
            id,
            config,
            conn: None,
            lifecycle: ConnectionLifecycle::Disconnected,
            cancel: None,
            tool_map: HashMap::new(),
            name_mapping: HashMap::new(),
            consecutive_failures: 0,
            health_task: None,
            sync_task: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lifecycle == ConnectionLifecycle::Connected
    }

    /// Look up the original MCP tool name given the sanitized (identifier-safe) name.
    pub fn original_name_for_sanitized(&self, sanitized: &str) -> Option<&str> {
        self.name_mapping.get(sanitized).map(String::as_str)
    }

    /// Abort any running monitor/syncer tasks for this client (spec §4.1
    /// `Remove`: "stop monitors"; §5 Cleanup).
    pub fn stop_tasks(&mut self) {
        if let Some(h) = self.health_task.take() {
            h.abort();
        }
        if let Some(h) = self.sync_task.take() {
            h.abort();
        }
    }
}
