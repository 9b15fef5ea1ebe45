//! Transport Layer (spec §2 row 2) and the external `McpTransport`
//! collaborator it wraps (spec §6).
//!
//! [`McpTransport`] is the trait boundary for "the underlying MCP protocol
//! client library" named as an external collaborator in spec §1/§6 — this
//! crate does not implement the MCP wire format (an explicit Non-goal).
//! What the crate *does* implement is the per-kind connection lifecycle
//! (process spawn for Stdio, long-lived stream setup for SSE, timeout-bounded
//! setup for HTTP/in-process) that the Connection Manager (§4.1) drives; the
//! concrete transports here manage that lifecycle while leaving the actual
//! JSON-RPC `initialize`/`list_tools`/`call_tool` exchange as an integration
//! point, pending a concrete MCP SDK binding.

pub mod http;
pub mod inprocess;
pub mod sse;
pub mod stdio;

#[cfg(test)]
pub mod testutil;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

pub use http::HttpTransport;
pub use inprocess::{InProcessServer, InProcessTransport};
pub use sse::SseTransport;
pub use stdio::StdioTransport;

/// Typed MCP response content blocks (spec §6).
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text { text: String },
    Image { data: String, mime_type: String },
    Audio { data: String, mime_type: String },
    EmbeddedResource { resource: Value },
}

impl ContentBlock {
    /// Extract a display string for this block, per spec §4.5 step 6:
    /// text blocks yield their text; other typed blocks yield a
    /// canonical-JSON serialization.
    pub fn extract_text(&self) -> String {
        match self {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::Image { data, mime_type } => {
                serde_json::json!({"type": "image", "data": data, "mimeType": mime_type})
                    .to_string()
            }
            ContentBlock::Audio { data, mime_type } => {
                serde_json::json!({"type": "audio", "data": data, "mimeType": mime_type})
                    .to_string()
            }
            ContentBlock::EmbeddedResource { resource } => {
                serde_json::json!({"type": "resource", "resource": resource}).to_string()
            }
        }
    }
}

/// Result of an MCP `call_tool` invocation (spec §6).
#[derive(Debug, Clone, Default)]
pub struct ToolCallResult {
    pub content: Vec<ContentBlock>,
}

impl ToolCallResult {
    /// Join every block's extracted text, per spec §8's round-trip property
    /// ("with text blocks, extraction returns block texts joined by `\n`").
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .map(ContentBlock::extract_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Server info returned by a successful `initialize` handshake.
#[derive(Debug, Clone, Default)]
pub struct InitializeInfo {
    pub server_name: Option<String>,
    pub server_version: Option<String>,
}

/// Parameters sent with the `initialize` request (spec §4.1 "send
/// Initialize with protocol version and a client identifier").
#[derive(Debug, Clone)]
pub struct InitializeParams {
    pub protocol_version: String,
    pub client_name: String,
    pub client_version: String,
}

/// The external MCP wire-protocol client (spec §6 external collaborator).
///
/// Implementations are expected to be supplied by an MCP SDK binding; the
/// transports in this module provide the connection-lifecycle shell the
/// rest of the core drives, leaving the actual protocol calls as an
/// integration point.
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn start(&self) -> anyhow::Result<()>;
    async fn initialize(&self, params: InitializeParams) -> anyhow::Result<InitializeInfo>;
    async fn list_tools(&self) -> anyhow::Result<Vec<Value>>;
    async fn call_tool(
        &self,
        name: &str,
        args: HashMap<String, Value>,
    ) -> anyhow::Result<ToolCallResult>;
    async fn ping(&self) -> anyhow::Result<()>;
    async fn close(&self) -> anyhow::Result<()>;
    /// Register a callback invoked when the transport detects the
    /// connection was lost out-of-band (e.g. a broken pipe on a long-lived
    /// stdio/SSE stream). Implementations that never detect this
    /// out-of-band may leave the callback unused.
    fn on_connection_lost(&self, callback: Box<dyn Fn() + Send + Sync>);
}

/// Supplies per-call HTTP headers for HTTP/SSE transports, possibly by
/// calling through to an [`crate::oauth::OAuth2Provider`] (spec §4.1 table).
#[async_trait]
pub trait HeadersProvider: Send + Sync {
    async fn headers(&self) -> anyhow::Result<HashMap<String, String>>;
}
