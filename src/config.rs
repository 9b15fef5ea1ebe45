//! Runtime configuration for the tool manager.
//!
//! Mirrors the knobs named throughout the core specification: per-call
//! timeout (§4.5, §5), health-check interval and failure threshold (§4.2),
//! tool-sync interval (§4.3), max agent depth (§4.7), and the code-mode
//! binding level (§4.8). `UpdateToolManagerConfig` (§6) swaps the whole
//! struct atomically under a single write-lock acquisition so a running
//! manager never observes a half-updated config.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Granularity at which the code-mode virtual file system exposes tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingLevel {
    /// One file per code-mode client: `servers/<name>.pyi`.
    Server,
    /// One file per tool: `servers/<client>/<tool>.pyi`.
    Tool,
}

impl Default for BindingLevel {
    fn default() -> Self {
        BindingLevel::Server
    }
}

/// Tunables for the connection manager, health monitor, tool syncer,
/// executor, and agent loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolManagerConfig {
    /// Per-call transport timeout in seconds. Default 30s (§5).
    pub call_timeout_secs: u64,
    /// Health-check ticker interval in seconds. Default 10s (§4.2).
    pub health_check_interval_secs: u64,
    /// Health-check per-attempt timeout in seconds. Fixed at 5s per §4.2.
    pub health_check_timeout_secs: u64,
    /// Consecutive failures before a client is marked Disconnected. Default 5 (§4.2).
    pub max_consecutive_failures: u32,
    /// Global tool-sync interval in seconds when a client has no override. Default 600s (§4.3).
    pub tool_sync_interval_secs: u64,
    /// Tool-sync per-tick timeout in seconds. Fixed at 10s per §4.3.
    pub tool_sync_timeout_secs: u64,
    /// Maximum agent-loop depth `D`. Must be >= 1 (§4.7).
    pub max_agent_depth: u32,
    /// Code-mode VFS binding granularity (§4.8).
    pub binding_level: BindingLevel,
    /// Timeout in seconds for one `executeToolCode` run (§4.8 step 5).
    pub sandbox_execution_timeout_secs: u64,
}

impl Default for ToolManagerConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 30,
            health_check_interval_secs: 10,
            health_check_timeout_secs: 5,
            max_consecutive_failures: 5,
            tool_sync_interval_secs: 600,
            tool_sync_timeout_secs: 10,
            max_agent_depth: 5,
            binding_level: BindingLevel::Server,
            sandbox_execution_timeout_secs: 30,
        }
    }
}

impl ToolManagerConfig {
    /// Validate the config, returning a descriptive error if any knob is out of range.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_agent_depth < 1 {
            return Err("max_agent_depth must be >= 1".to_string());
        }
        Ok(())
    }
}

/// Shared, hot-swappable handle to a [`ToolManagerConfig`].
///
/// Cloning a handle is cheap (it's an `Arc<RwLock<..>>`); all live
/// subsystems (connection manager, health monitor, tool syncer, executor,
/// agent loop) hold a clone and read through it, so a single
/// `update` call is visible everywhere on the next read.
#[derive(Clone)]
pub struct SharedConfig(Arc<RwLock<ToolManagerConfig>>);

impl SharedConfig {
    pub fn new(config: ToolManagerConfig) -> Self {
        Self(Arc::new(RwLock::new(config)))
    }

    /// Snapshot the current config.
    pub fn get(&self) -> ToolManagerConfig {
        self.0.read().clone()
    }

    /// Atomically replace select fields.
    ///
    /// Corresponds to `UpdateToolManagerConfig(timeout, maxDepth, bindingLevel)`
    /// (spec §6).
    pub fn update(
        &self,
        call_timeout_secs: Option<u64>,
        max_agent_depth: Option<u32>,
        binding_level: Option<BindingLevel>,
    ) -> Result<(), String> {
        let mut guard = self.0.write();
        let mut next = guard.clone();
        if let Some(t) = call_timeout_secs {
            next.call_timeout_secs = t;
        }
        if let Some(d) = max_agent_depth {
            next.max_agent_depth = d;
        }
        if let Some(b) = binding_level {
            next.binding_level = b;
        }
        next.validate()?;
        *guard = next;
        Ok(())
    }
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self::new(ToolManagerConfig::default())
    }
}
