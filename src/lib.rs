//! `mcp_core`: connection, execution, and agent-loop core for an MCP
//! (Model-Context-Protocol) tool-server integration.
//!
//! This crate owns three tightly coupled capabilities: a lifecycle-managed
//! registry of MCP tool-server connections across four transports
//! ([`connection_manager`], [`health`], [`tool_sync`]); a uniform tool-call
//! executor that projects requests/results between the Chat and Responses
//! LLM shapes ([`executor`], [`adapter`]); and an iterative agent loop that
//! consumes tool calls from an LLM response, auto-executes allowed ones
//! (including the code-mode sandbox), and stops on approval-required calls
//! or max depth ([`agent_loop`], [`sandbox`]).
//!
//! It does not implement an LLM, the MCP wire protocol, or conversation
//! persistence — those are the caller's [`llm::LlmCaller`],
//! [`transport::McpTransport`], and storage layer respectively.

pub mod adapter;
pub mod agent_loop;
pub mod config;
pub mod connection_manager;
pub mod enrichment;
pub mod error;
pub mod executor;
pub mod filters;
pub mod health;
pub mod llm;
pub mod local_tool_server;
pub mod oauth;
pub mod plugin;
pub mod policy;
pub mod registry;
pub mod request_id;
pub mod sandbox;
pub mod schema_cache;
pub mod tool_sync;
pub mod transport;

use std::sync::Arc;

use serde_json::Value;

use adapter::{ExtractedToolCall, LlmRequest, LlmResponse};
use agent_loop::{AgentLoop, AgentOutcome};
use config::{BindingLevel, SharedConfig, ToolManagerConfig};
use connection_manager::{ClientSnapshot, ConnectionManager};
use error::McpCoreError;
use executor::ToolExecutor;
use llm::LlmCaller;
use plugin::PluginPipeline;
use policy::RequestFilter;
use registry::client_state::{ClientEdit, ClientId, ConnectionConfig};
use request_id::RequestIdGenerator;

/// The public facade (spec §6): management API, tool-call API, agent API,
/// and atomic config updates, all backed by one shared [`ConnectionManager`].
#[derive(Clone)]
pub struct McpCore {
    manager: Arc<ConnectionManager>,
    executor: ToolExecutor,
    agent: AgentLoop,
    config: SharedConfig,
}

impl McpCore {
    pub fn new(config: ToolManagerConfig, pipeline: Option<Arc<dyn PluginPipeline>>) -> Self {
        let shared = SharedConfig::new(config);
        let manager = ConnectionManager::new(shared.clone());
        let executor = ToolExecutor::new(Arc::clone(&manager), pipeline);
        let agent = AgentLoop::new(Arc::clone(&manager), executor.clone(), shared.clone());
        Self { manager, executor, agent, config: shared }
    }

    // -- Management API (spec §6) -----------------------------------------

    pub async fn add_client(&self, id: ClientId, config: ConnectionConfig) -> Result<(), McpCoreError> {
        self.manager.add(id, config).await
    }

    pub async fn remove_client(&self, id: &str) -> Result<(), McpCoreError> {
        self.manager.remove(id).await
    }

    pub async fn reconnect_client(&self, id: &str) -> Result<(), McpCoreError> {
        self.manager.reconnect(id).await
    }

    pub fn edit_client(&self, id: &str, edit: ClientEdit) -> Result<(), McpCoreError> {
        self.manager.edit(id, edit)
    }

    pub async fn register_local_tool(
        &self,
        name: &str,
        description: &str,
        parameters: Value,
        handler: local_tool_server::LocalToolHandler,
    ) -> Result<(), McpCoreError> {
        self.manager.register_local_tool(name, description, parameters, handler).await
    }

    pub fn get_clients(&self) -> Vec<ClientSnapshot> {
        self.manager.all_snapshots()
    }

    pub async fn cleanup(&self) {
        self.manager.cleanup().await
    }

    // -- Tool-call API (spec §6, §4.5) ------------------------------------

    /// Execute one uniform MCP request tagged as either a Chat or a
    /// Responses tool call. The caller is responsible for the Chat<->
    /// Responses message-shape conversion around the single call; this is
    /// the shape-neutral per-call primitive the agent loop also uses.
    pub async fn execute(
        &self,
        call: &ExtractedToolCall,
        request_filter: &RequestFilter,
        ctx: &request_id::RequestContext,
    ) -> Result<adapter::ToolExecutionResult, McpCoreError> {
        self.executor.execute(call, request_filter, ctx).await
    }

    // -- Agent API (spec §6) ------------------------------------------------

    /// `CheckAndExecuteAgentForChat` / `...ForResponses`: both shapes run
    /// through the same tagged-union state machine. Returns the original
    /// response unchanged when it carries no tool calls.
    pub async fn check_and_execute_agent(
        &self,
        request: LlmRequest,
        response: LlmResponse,
        llm: &dyn LlmCaller,
        request_filter: &RequestFilter,
        id_generator: Option<&dyn RequestIdGenerator>,
        turn_request_id: String,
    ) -> Result<AgentOutcome, McpCoreError> {
        self.agent
            .run(request, response, llm, request_filter, id_generator, turn_request_id)
            .await
    }

    // -- Enrichment (spec §4.9) --------------------------------------------

    /// Merge visible tools (plus code-mode meta-tools where applicable)
    /// into an outgoing LLM request, per the integration-aware duplicate
    /// policy.
    pub fn enrich_request(&self, request: LlmRequest, request_filter: &RequestFilter) -> LlmRequest {
        let snapshots = self.manager.all_snapshots();
        let tools = enrichment::enrich_tools(request.tools(), &snapshots, request_filter);
        request.with_tools(tools)
    }

    // -- Config updates (spec §6) -------------------------------------------

    pub fn update_tool_manager_config(
        &self,
        call_timeout_secs: Option<u64>,
        max_agent_depth: Option<u32>,
        binding_level: Option<BindingLevel>,
    ) -> Result<(), String> {
        self.config.update(call_timeout_secs, max_agent_depth, binding_level)
    }

    pub fn config(&self) -> SharedConfig {
        self.config.clone()
    }
}
