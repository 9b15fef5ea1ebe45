//! Server-Sent-Events transport (spec §2 row 2, §4.1 table).
//!
//! Long-lived by nature (spec §4.1: "SSE use a long-lived context for the
//! ... stream").

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{HeadersProvider, InitializeInfo, InitializeParams, McpTransport, ToolCallResult};

pub struct SseTransport {
    pub url: String,
    headers_provider: Option<Arc<dyn HeadersProvider>>,
    connected: AtomicBool,
    lost_callback: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl SseTransport {
    pub fn new(url: impl Into<String>, headers_provider: Option<Arc<dyn HeadersProvider>>) -> Self {
        Self {
            url: url.into(),
            headers_provider,
            connected: AtomicBool::new(false),
            lost_callback: Mutex::new(None),
        }
    }

    pub fn server_identifier(&self) -> String {
        format!("sse:{}", self.url)
    }
}

#[async_trait]
impl McpTransport for SseTransport {
    async fn start(&self) -> anyhow::Result<()> {
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }
        if let Some(provider) = &self.headers_provider {
            provider.headers().await?;
        }
        log::info!("sse transport connecting to {}", self.url);
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn initialize(&self, _params: InitializeParams) -> anyhow::Result<InitializeInfo> {
        Ok(InitializeInfo::default())
    }

    async fn list_tools(&self) -> anyhow::Result<Vec<Value>> {
        Ok(Vec::new())
    }

    async fn call_tool(
        &self,
        name: &str,
        _args: HashMap<String, Value>,
    ) -> anyhow::Result<ToolCallResult> {
        Err(anyhow::anyhow!(
            "sse call_tool('{name}') requires an MCP SDK binding"
        ))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("sse transport not connected"))
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::Release);
        log::info!("sse transport disconnected from {}", self.url);
        Ok(())
    }

    fn on_connection_lost(&self, callback: Box<dyn Fn() + Send + Sync>) {
        *self.lost_callback.lock().unwrap() = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn server_identifier_contains_url() {
        let t = SseTransport::new("https://example.com/sse", None);
        assert_eq!(t.server_identifier(), "sse:https://example.com/sse");
    }
}
