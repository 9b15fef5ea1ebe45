//! Stdio transport: local MCP servers spawned as child processes.
//!
//! Spawn owns the process lifecycle (pipe stdio, merge env, kill on
//! disconnect/drop); the JSON-RPC exchange itself is left to the MCP SDK
//! integration point (spec §1 Non-goals: implementing the MCP wire format).

use std::collections::HashMap;
use std::process::Stdio as StdStdio;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::{Child, Command};

use super::{InitializeInfo, InitializeParams, McpTransport, ToolCallResult};

pub struct StdioTransport {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    process: Mutex<Option<Child>>,
    lost_callback: Mutex<Option<Box<dyn Fn() + Send + Sync>>>,
}

impl StdioTransport {
    pub fn new(command: impl Into<String>, args: Vec<String>, env: HashMap<String, String>) -> Self {
        Self {
            command: command.into(),
            args,
            env,
            process: Mutex::new(None),
            lost_callback: Mutex::new(None),
        }
    }

    pub fn server_identifier(&self) -> String {
        format!("stdio:{}:{}", self.command, self.args.join(":"))
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn start(&self) -> anyhow::Result<()> {
        if self.process.lock().unwrap().is_some() {
            return Ok(());
        }

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .stdin(StdStdio::piped())
            .stdout(StdStdio::piped())
            .stderr(StdStdio::piped());
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let child = cmd
            .spawn()
            .map_err(|e| anyhow::anyhow!("failed to start MCP server process '{}': {e}", self.command))?;

        *self.process.lock().unwrap() = Some(child);
        log::info!("stdio transport started: {} {}", self.command, self.args.join(" "));
        Ok(())
    }

    async fn initialize(&self, _params: InitializeParams) -> anyhow::Result<InitializeInfo> {
        // MCP SDK integration point (wire format is out of scope).
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
            "stdio call_tool('{name}') requires an MCP SDK binding"
        ))
    }

    async fn ping(&self) -> anyhow::Result<()> {
        if self.process.lock().unwrap().is_some() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("stdio process not started"))
        }
    }

    async fn close(&self) -> anyhow::Result<()> {
        let mut guard = self.process.lock().unwrap();
        if let Some(mut child) = guard.take() {
            let _ = child.start_kill();
        }
        log::info!("stdio transport closed: {} {}", self.command, self.args.join(" "));
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
    async fn server_identifier_includes_command_and_args() {
        let t = StdioTransport::new("python", vec!["server.py".into()], HashMap::new());
        assert_eq!(t.server_identifier(), "stdio:python:server.py");
    }

    #[tokio::test]
    async fn ping_fails_before_start() {
        let t = StdioTransport::new("true", vec![], HashMap::new());
        assert!(t.ping().await.is_err());
    }
}
