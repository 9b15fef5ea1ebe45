//! The lazily-created in-process server backing `RegisterLocalTool` (spec
//! §4.1, §5 "Local in-process server is lazily created once and reused").

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use crate::transport::{ContentBlock, InProcessServer, ToolCallResult};

pub type LocalToolHandler = Arc<
    dyn Fn(HashMap<String, Value>) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send>>
        + Send
        + Sync,
>;

struct LocalTool {
    schema: Value,
    handler: LocalToolHandler,
}

/// In-process tool server that host code registers closures into directly,
/// bypassing any transport. One instance is shared by the reserved
/// [`crate::registry::INTERNAL_CLIENT_ID`] client.
#[derive(Default)]
pub struct LocalToolServer {
    tools: RwLock<HashMap<String, LocalTool>>,
}

impl LocalToolServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its raw (unprefixed) MCP name. Returns an
    /// error if a tool with that name is already registered.
    pub fn register(&self, name: &str, schema: Value, handler: LocalToolHandler) -> anyhow::Result<()> {
        let mut tools = self.tools.write();
        if tools.contains_key(name) {
            anyhow::bail!("local tool '{name}' is already registered");
        }
        tools.insert(name.to_string(), LocalTool { schema, handler });
        Ok(())
    }
}

#[async_trait]
impl InProcessServer for LocalToolServer {
    async fn list_tools(&self) -> anyhow::Result<Vec<Value>> {
        Ok(self.tools.read().values().map(|t| t.schema.clone()).collect())
    }

    async fn call_tool(&self, name: &str, args: HashMap<String, Value>) -> anyhow::Result<ToolCallResult> {
        let handler = {
            let tools = self.tools.read();
            let tool = tools
                .get(name)
                .ok_or_else(|| anyhow::anyhow!("local tool '{name}' not found"))?;
            tool.handler.clone()
        };
        let text = handler(args).await?;
        Ok(ToolCallResult {
            content: vec![ContentBlock::Text { text }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn register_and_call_round_trips() {
        let server = LocalToolServer::new();
        server
            .register(
                "ping",
                json!({"type": "function", "function": {"name": "ping"}}),
                Arc::new(|_args| Box::pin(async { Ok("pong".to_string()) })),
            )
            .unwrap();

        let tools = server.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);

        let result = server.call_tool("ping", HashMap::new()).await.unwrap();
        assert_eq!(result.joined_text(), "pong");
    }

    #[tokio::test]
    async fn duplicate_registration_errors() {
        let server = LocalToolServer::new();
        let handler: LocalToolHandler = Arc::new(|_| Box::pin(async { Ok(String::new()) }));
        server.register("ping", json!({}), handler.clone()).unwrap();
        assert!(server.register("ping", json!({}), handler).is_err());
    }
}
