//! Error taxonomy for the MCP integration core.
//!
//! Corresponds to the error kinds enumerated in the core specification §7.
//! Each subsystem gets its own `thiserror` enum so callers that need to
//! branch on kind can match a concrete type; [`McpCoreError`] aggregates
//! all of them for the crate's public API boundary, the way `crewai`'s
//! module system reports a concrete `ModuleError` internally while
//! surfacing `anyhow::Error` at the edges.

use thiserror::Error;

/// Errors raised while validating or mutating connection configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("client id '{0}' is already registered")]
    DuplicateClientId(String),
    #[error("client name '{0}' is invalid: {1}")]
    InvalidClientName(String, &'static str),
    #[error("tool name '{0}' is invalid: {1}")]
    InvalidToolName(String, &'static str),
    #[error("connection field '{0}' cannot be changed after creation")]
    ImmutableField(&'static str),
    #[error("required environment variable '{0}' is not set")]
    MissingEnvVar(String),
    #[error("unknown connection type '{0}'")]
    UnknownConnectionType(String),
}

/// Errors raised while starting or tearing down a transport connection.
#[derive(Debug, Error)]
pub enum TransportStartupError {
    #[error("client '{0}' not found in registry")]
    ClientNotFound(String),
    #[error("transport start failed for client '{0}': {1}")]
    StartFailed(String, String),
    #[error("initialize handshake failed for client '{0}': {1}")]
    InitializeFailed(String, String),
    #[error("list-tools failed during connect for client '{0}': {1}")]
    ListToolsFailed(String, String),
    #[error("connection timed out for client '{0}' after {1}s")]
    Timeout(String, u64),
}

/// Errors raised while resolving or invoking a tool call.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("tool '{0}' not found")]
    ToolNotFound(String),
    #[error("tool '{0}' is forbidden by policy")]
    ToolForbidden(String),
    #[error("client '{0}' owning tool '{1}' is not connected")]
    ClientDisconnected(String, String),
    #[error("failed to parse tool arguments: {0}")]
    InvalidArguments(#[from] serde_json::Error),
    #[error("tool '{0}' execution failed: {1}")]
    ToolExecution(String, String),
    #[error("tool '{0}' timed out after {1}ms")]
    Timeout(String, u64),
    #[error("call cancelled")]
    Cancelled,
}

/// Errors surfaced by the plugin pre/post hook pipeline.
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("pre-hook short-circuited with error: {0}")]
    ShortCircuit(String),
}

/// Errors raised while compiling or running a code-mode program.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("file '{0}' not found in virtual file system")]
    FileNotFound(String),
    #[error("ambiguous file name '{0}' matches multiple entries: {1:?}")]
    AmbiguousFileName(String, Vec<String>),
}

/// Aggregate error type for the crate's public API.
#[derive(Debug, Error)]
pub enum McpCoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    TransportStartup(#[from] TransportStartupError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
    #[error(transparent)]
    Plugin(#[from] PluginError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error("llm call failed: {0}")]
    Llm(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, McpCoreError>;
