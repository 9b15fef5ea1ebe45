//! In-process transport (spec §2 row 2, §4.1 table).
//!
//! Unlike the network-bound transports, an in-process connection never
//! leaves the host, so there is no wire format to defer: the transport
//! forwards `list_tools`/`call_tool` directly to the bound
//! [`InProcessServer`]. This is how `RegisterLocalTool` (spec §4.1) and
//! any caller-provided embedded server are wired up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use super::{InitializeInfo, InitializeParams, McpTransport, ToolCallResult};

/// A host-registered, in-process tool server (spec §4.1 `RegisterLocalTool`).
#[async_trait]
pub trait InProcessServer: Send + Sync {
    async fn list_tools(&self) -> anyhow::Result<Vec<Value>>;
    async fn call_tool(&self, name: &str, args: HashMap<String, Value>) -> anyhow::Result<ToolCallResult>;
}

pub struct InProcessTransport {
    server: Arc<dyn InProcessServer>,
    connected: AtomicBool,
    lost_callback: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl InProcessTransport {
    pub fn new(server: Arc<dyn InProcessServer>) -> Self {
        Self {
            server,
            connected: AtomicBool::new(false),
            lost_callback: Mutex::new(None),
        }
    }
}

#[async_trait]
impl McpTransport for InProcessTransport {
    async fn start(&self) -> anyhow::Result<()> {
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn initialize(&self, _params: InitializeParams) -> anyhow::Result<InitializeInfo> {
        Ok(InitializeInfo {
            server_name: Some("in-process".to_string()),
            server_version: None,
        })
    }

    async fn list_tools(&self) -> anyhow::Result<Vec<Value>> {
        self.server.list_tools().await
    }

    async fn call_tool(
        &self,
        name: &str,
        args: HashMap<String, Value>,
    ) -> anyhow::Result<ToolCallResult> {
        self.server.call_tool(name, args).await
    }

    async fn ping(&self) -> anyhow::Result<()> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(anyhow::anyhow!("in-process transport not started"))
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    fn on_connection_lost(&self, callback: Box<dyn Fn() + Send + Sync>) {
        *self.lost_callback.lock().unwrap() = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ContentBlock;

    struct EchoServer;

    #[async_trait]
    impl InProcessServer for EchoServer {
        async fn list_tools(&self) -> anyhow::Result<Vec<Value>> {
            Ok(vec![serde_json::json!({
                "type": "function",
                "function": {"name": "echo", "parameters": {"type": "object"}}
            })])
        }

        async fn call_tool(&self, name: &str, args: HashMap<String, Value>) -> anyhow::Result<ToolCallResult> {
            Ok(ToolCallResult {
                content: vec![ContentBlock::Text {
                    text: format!("{name}:{args:?}"),
                }],
            })
        }
    }

    #[tokio::test]
    async fn delegates_list_and_call_directly() {
        let t = InProcessTransport::new(Arc::new(EchoServer));
        t.start().await.unwrap();
        let tools = t.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);

        let result = t.call_tool("echo", HashMap::new()).await.unwrap();
        assert_eq!(result.joined_text(), "echo:{}");
    }
}
