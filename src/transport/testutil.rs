//! In-memory fake [`McpTransport`] for unit tests across the crate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use super::{ContentBlock, InitializeInfo, InitializeParams, McpTransport, ToolCallResult};

/// A fake transport whose tool list and call results are fully scripted,
/// and whose `ping`/`list_tools` calls can be made to fail a fixed number
/// of times (for exercising health-monitor and retry-classifier tests).
pub struct FakeTransport {
    pub tools: Mutex<Vec<Value>>,
    pub call_results: Mutex<HashMap<String, Result<String, String>>>,
    pub fail_next_n_pings: AtomicU32,
    pub ping_available: bool,
    started: AtomicBool,
    lost_callback: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl FakeTransport {
    pub fn new(tools: Vec<Value>) -> Self {
        Self {
            tools: Mutex::new(tools),
            call_results: Mutex::new(HashMap::new()),
            fail_next_n_pings: AtomicU32::new(0),
            ping_available: true,
            started: AtomicBool::new(false),
            lost_callback: Mutex::new(None),
        }
    }

    pub fn with_call_result(self, tool: &str, result: Result<String, String>) -> Self {
        self.call_results.lock().unwrap().insert(tool.to_string(), result);
        self
    }

    pub fn set_tools(&self, tools: Vec<Value>) {
        *self.tools.lock().unwrap() = tools;
    }
}

#[async_trait]
impl McpTransport for FakeTransport {
    async fn start(&self) -> anyhow::Result<()> {
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn initialize(&self, _params: InitializeParams) -> anyhow::Result<InitializeInfo> {
        Ok(InitializeInfo::default())
    }

    async fn list_tools(&self) -> anyhow::Result<Vec<Value>> {
        Ok(self.tools.lock().unwrap().clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        _args: HashMap<String, Value>,
    ) -> anyhow::Result<ToolCallResult> {
        let results = self.call_results.lock().unwrap();
        match results.get(name) {
            Some(Ok(text)) => Ok(ToolCallResult {
                content: vec![ContentBlock::Text { text: text.clone() }],
            }),
            Some(Err(e)) => Err(anyhow::anyhow!("{e}")),
            None => Ok(ToolCallResult {
                content: vec![ContentBlock::Text {
                    text: format!("no scripted result for {name}"),
                }],
            }),
        }
    }

    async fn ping(&self) -> anyhow::Result<()> {
        let remaining = self.fail_next_n_pings.load(Ordering::Acquire);
        if remaining > 0 {
            self.fail_next_n_pings.fetch_sub(1, Ordering::AcqRel);
            return Err(anyhow::anyhow!("connection refused"));
        }
        Ok(())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.started.store(false, Ordering::Release);
        Ok(())
    }

    fn on_connection_lost(&self, callback: Box<dyn Fn() + Send + Sync>) {
        *self.lost_callback.lock().unwrap() = Some(callback);
    }
}
