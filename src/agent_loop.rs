//! Agent Loop (spec §2 row 9, §4.7).
//!
//! Consumes an LLM response that may carry tool calls, separates
//! auto-executable calls from ones that need human approval, runs the auto
//! calls (including the code-mode meta-tools), feeds results back to the
//! LLM, and repeats until no tool calls remain, an approval-required call
//! blocks the turn, or `max_agent_depth` is reached.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::adapter::{
    self, ExtractedToolCall, LlmRequest, LlmResponse, ToolExecutionResult,
};
use crate::adapter::chat::ToolCallMetadata;
use crate::config::SharedConfig;
use crate::connection_manager::{ClientSnapshot, ConnectionManager};
use crate::error::McpCoreError;
use crate::executor::{format_tool_failure, ToolExecutor};
use crate::llm::LlmCaller;
use crate::policy::{self, RequestFilter};
use crate::registry::naming::strip_client_prefix;
use crate::request_id::{RequestContext, RequestIdGenerator};
use crate::sandbox::{self, extractor, CodeOutcome, EXECUTE_TOOL_CODE, LIST_TOOL_FILES, READ_TOOL_FILE};

/// Whether one extracted tool call may run without human approval
/// (spec §4.7 step 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Auto,
    ApprovalRequired,
}

/// Outcome of running the loop to completion: the final response the
/// caller should surface, unchanged from the original when no tool calls
/// were present at all.
pub struct AgentOutcome {
    pub response: LlmResponse,
    pub executed_results: Vec<ToolExecutionResult>,
    pub executed_tool_calls: Vec<ExtractedToolCall>,
}

#[derive(Clone)]
pub struct AgentLoop {
    manager: Arc<ConnectionManager>,
    executor: ToolExecutor,
    config: SharedConfig,
}

impl AgentLoop {
    pub fn new(manager: Arc<ConnectionManager>, executor: ToolExecutor, config: SharedConfig) -> Self {
        Self { manager, executor, config }
    }

    /// Drive the loop to completion for one top-level turn (spec §4.7,
    /// §6 `CheckAndExecuteAgentForChat`/`...ForResponses` — both shapes
    /// flow through this single state machine via the tagged-union
    /// adapter).
    pub async fn run(
        &self,
        mut request: LlmRequest,
        mut response: LlmResponse,
        llm: &dyn LlmCaller,
        request_filter: &RequestFilter,
        id_generator: Option<&dyn RequestIdGenerator>,
        turn_request_id: String,
    ) -> Result<AgentOutcome, McpCoreError> {
        let max_depth = self.config.get().max_agent_depth;
        let mut ctx = RequestContext::root(turn_request_id);
        let mut depth: u32 = 1;
        let mut executed_results: Vec<ToolExecutionResult> = Vec::new();
        let mut executed_tool_calls: Vec<ExtractedToolCall> = Vec::new();
        let mut summary: Vec<(String, Value)> = Vec::new();

        loop {
            // Step 1: extract tool calls from the current response.
            let calls = adapter::extract_tool_calls(&response);
            if calls.is_empty() {
                return Ok(AgentOutcome { response, executed_results, executed_tool_calls });
            }

            let snapshots = self.manager.all_snapshots();

            // Step 2: classify each call.
            let mut auto_calls = Vec::new();
            let mut approval_calls = Vec::new();
            for call in calls {
                match classify(&call, &snapshots, request_filter) {
                    Classification::Auto => auto_calls.push(call),
                    Classification::ApprovalRequired => approval_calls.push(call),
                }
            }

            // Step 4 (run ahead of step 3's gate): a mix of auto and
            // approval-required calls in the same response still executes
            // the auto ones before the turn stops (worked example 4) — the
            // "no auto tools have yet executed this turn" check in step 3
            // reads the state *after* this iteration's own auto calls run,
            // not before.
            if !auto_calls.is_empty() {
                adapter::append_assistant_turn(&mut request, &response);

                let binding_level = self.config.get().binding_level;
                let sandbox_timeout = Duration::from_secs(self.config.get().sandbox_execution_timeout_secs);
                let results = self
                    .execute_auto_tools(&auto_calls, &snapshots, request_filter, &ctx, binding_level, sandbox_timeout)
                    .await;

                adapter::append_tool_results(&mut request, &results);

                for (call, result) in auto_calls.iter().zip(results.iter()) {
                    summary.push(summary_entry(call, result));
                }
                executed_tool_calls.extend(auto_calls);
                executed_results.extend(results);
            }

            // Step 3: any approval-required call blocks the turn.
            if !approval_calls.is_empty() {
                if depth == 1 && executed_results.is_empty() {
                    return Ok(AgentOutcome { response, executed_results, executed_tool_calls });
                }
                let synthesized = adapter::build_executed_tools_response(&response, &summary, &approval_calls);
                return Ok(AgentOutcome { response: synthesized, executed_results, executed_tool_calls });
            }

            // Step 5/6: issue the next LLM call against the updated history.
            if let Some(gen) = id_generator {
                ctx = ctx.child(Some(gen), "agent_iteration");
            }
            response = llm.complete(&request).await.map_err(|e| McpCoreError::Llm(e.to_string()))?;

            // Step 7: depth bookkeeping.
            depth += 1;
            if depth >= max_depth.max(1) {
                return Ok(AgentOutcome { response, executed_results, executed_tool_calls });
            }
        }
    }

    async fn execute_auto_tools(
        &self,
        calls: &[ExtractedToolCall],
        snapshots: &[ClientSnapshot],
        request_filter: &RequestFilter,
        ctx: &RequestContext,
        binding_level: crate::config::BindingLevel,
        sandbox_timeout: Duration,
    ) -> Vec<ToolExecutionResult> {
        if calls.is_empty() {
            return Vec::new();
        }

        // Spec §5: N workers, bounded result channel sized N, no ordering
        // guarantee among results themselves (the assistant turn that
        // requested them was already appended before this call runs).
        let (tx, mut rx) = tokio::sync::mpsc::channel::<(usize, ToolExecutionResult)>(calls.len());

        for (index, call) in calls.iter().enumerate() {
            let tx = tx.clone();
            let call = call.clone();
            let executor = self.executor.clone();
            let snapshots = snapshots.to_vec();
            let request_filter = request_filter.clone();
            let ctx = ctx.clone();
            tokio::spawn(async move {
                let result = execute_one_auto(&executor, &snapshots, &request_filter, &ctx, &call, binding_level, sandbox_timeout).await;
                let _ = tx.send((index, result)).await;
            });
        }
        drop(tx);

        let mut slots: Vec<Option<ToolExecutionResult>> = (0..calls.len()).map(|_| None).collect();
        for _ in 0..calls.len() {
            if let Some((index, result)) = rx.recv().await {
                slots[index] = Some(result);
            }
        }
        slots.into_iter().flatten().collect()
    }
}

/// Dispatch one auto-executable call: the three sandbox meta-tools resolve
/// locally against the VFS/interpreter, everything else goes through the
/// ordinary tool executor. A failed ordinary call still produces a tool
/// message (spec §4.7 "Failure per tool"); sandbox diagnostics are always
/// reported as a successful invocation whose content carries the error
/// (spec §7 Sandbox Compile/Syntax, Sandbox Runtime rows).
async fn execute_one_auto(
    executor: &ToolExecutor,
    snapshots: &[ClientSnapshot],
    request_filter: &RequestFilter,
    ctx: &RequestContext,
    call: &ExtractedToolCall,
    binding_level: crate::config::BindingLevel,
    sandbox_timeout: Duration,
) -> ToolExecutionResult {
    match call.name.as_str() {
        LIST_TOOL_FILES => {
            let files = sandbox::list_tool_files(snapshots, binding_level);
            let content = serde_json::to_string(&files).unwrap_or_else(|_| "[]".to_string());
            meta_result(call, content)
        }
        READ_TOOL_FILE => {
            let args: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
            let file_name = args.get("fileName").and_then(Value::as_str).unwrap_or_default();
            let start_line = args.get("startLine").and_then(Value::as_u64).map(|v| v as usize);
            let end_line = args.get("endLine").and_then(Value::as_u64).map(|v| v as usize);
            let content = match sandbox::read_tool_file(snapshots, binding_level, file_name, start_line, end_line) {
                Ok(text) => text,
                Err(e) => e.to_string(),
            };
            meta_result(call, content)
        }
        EXECUTE_TOOL_CODE => {
            let args: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
            let code = args.get("code").and_then(Value::as_str).unwrap_or_default();
            let child_ctx = ctx.child(None, EXECUTE_TOOL_CODE);
            let outcome = sandbox::execute_tool_code(executor, snapshots, request_filter, &child_ctx, code, sandbox_timeout).await;
            meta_result(call, code_outcome_to_content(outcome))
        }
        _ => match executor.execute(call, request_filter, ctx).await {
            Ok(result) => result,
            Err(err) => ToolExecutionResult {
                tool_call_id: call.id.clone(),
                content: format_tool_failure(&call.name, &err),
                metadata: ToolCallMetadata::default(),
            },
        },
    }
}

fn meta_result(call: &ExtractedToolCall, content: String) -> ToolExecutionResult {
    ToolExecutionResult {
        tool_call_id: call.id.clone(),
        content,
        metadata: ToolCallMetadata {
            client_name: None,
            original_tool_name: Some(call.name.clone()),
            elapsed_ms: None,
        },
    }
}

fn code_outcome_to_content(outcome: CodeOutcome) -> String {
    let payload = match outcome {
        CodeOutcome::NoData => serde_json::json!({"result": null, "logs": []}),
        CodeOutcome::Success { result, logs } => serde_json::json!({"result": result, "logs": logs}),
        CodeOutcome::CompletedNoData { logs } => {
            serde_json::json!({"result": null, "logs": logs, "note": "completed but no data produced"})
        }
        CodeOutcome::Error { message, hint } => serde_json::json!({"error": message, "hint": hint}),
    };
    serde_json::to_string(&payload).unwrap_or_else(|_| "{}".to_string())
}

/// Spec §4.6: the "executed-tools" summary maps original tool names (via
/// the call's own ID) to their outputs, JSON-decoding the content where
/// possible.
fn summary_entry(call: &ExtractedToolCall, result: &ToolExecutionResult) -> (String, Value) {
    let name = result.metadata.original_tool_name.clone().unwrap_or_else(|| call.name.clone());
    let value = serde_json::from_str::<Value>(&result.content).unwrap_or_else(|_| Value::String(result.content.clone()));
    (name, value)
}

/// Spec §4.7 step 2 classification.
fn classify(call: &ExtractedToolCall, snapshots: &[ClientSnapshot], request_filter: &RequestFilter) -> Classification {
    if call.name == LIST_TOOL_FILES || call.name == READ_TOOL_FILE {
        return Classification::Auto;
    }
    if call.name == EXECUTE_TOOL_CODE {
        let args: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
        let code = args.get("code").and_then(Value::as_str).unwrap_or_default();
        return if extractor::is_auto_executable(code, snapshots) {
            Classification::Auto
        } else {
            Classification::ApprovalRequired
        };
    }
    let owner = snapshots.iter().find(|s| s.tool_map.contains_key(&call.name));
    match owner {
        None => Classification::ApprovalRequired,
        Some(snapshot) => match strip_client_prefix(&snapshot.name, &call.name) {
            Some(unprefixed) if policy::is_auto_executable(snapshot, unprefixed, request_filter) => Classification::Auto,
            _ => Classification::ApprovalRequired,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::chat::{CallParams, ChatMessage, ChatResponse, ChatToolCall};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    struct ScriptedLlm {
        responses: Mutex<Vec<ChatResponse>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl LlmCaller for ScriptedLlm {
        async fn complete(&self, _request: &LlmRequest) -> anyhow::Result<LlmResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut guard = self.responses.lock().unwrap();
            Ok(LlmResponse::Chat(guard.remove(0)))
        }
    }

    fn request() -> LlmRequest {
        LlmRequest::Chat(crate::adapter::chat::ChatRequest {
            call_params: CallParams::default(),
            input: vec![],
            tools: None,
        })
    }

    #[tokio::test]
    async fn no_tool_calls_returns_same_response_with_zero_llm_calls() {
        let manager = ConnectionManager::new(SharedConfig::default());
        let executor = ToolExecutor::new(Arc::clone(&manager), None);
        let agent = AgentLoop::new(manager, executor, SharedConfig::default());
        let resp = LlmResponse::Chat(ChatResponse::single(ChatMessage::assistant("done"), "stop"));
        let llm = ScriptedLlm { responses: Mutex::new(vec![]), calls: AtomicU32::new(0) };

        let outcome = agent
            .run(request(), resp, &llm, &RequestFilter::unrestricted(), None, "turn-1".into())
            .await
            .unwrap();

        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert!(outcome.executed_results.is_empty());
        match outcome.response {
            LlmResponse::Chat(r) => assert_eq!(r.choices[0].message.content.as_deref(), Some("done")),
            _ => panic!("wrong shape"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_at_depth_one_returns_original_response_unchanged() {
        let manager = ConnectionManager::new(SharedConfig::default());
        let executor = ToolExecutor::new(Arc::clone(&manager), None);
        let agent = AgentLoop::new(manager, executor, SharedConfig::default());
        let resp = LlmResponse::Chat(ChatResponse::single(
            ChatMessage::assistant_with_tool_calls(vec![ChatToolCall {
                id: "1".into(),
                name: "dangerous-drop".into(),
                arguments: "{}".into(),
            }]),
            "tool_calls",
        ));
        let llm = ScriptedLlm { responses: Mutex::new(vec![]), calls: AtomicU32::new(0) };

        let outcome = agent
            .run(request(), resp.clone(), &llm, &RequestFilter::unrestricted(), None, "turn-1".into())
            .await
            .unwrap();

        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        match (outcome.response, resp) {
            (LlmResponse::Chat(a), LlmResponse::Chat(b)) => {
                assert_eq!(a.choices[0].message.tool_calls.as_ref().unwrap()[0].name, b.choices[0].message.tool_calls.as_ref().unwrap()[0].name);
            }
            _ => panic!("wrong shape"),
        }
    }

    #[tokio::test]
    async fn auto_tool_then_stop_yields_single_cumulative_entry() {
        // Drives worked example 3's shape (single auto tool, then a
        // stopping assistant message) via the registered-local-tool path,
        // which is always auto-executable and needs no live transport.
        let manager = ConnectionManager::new(SharedConfig::default());
        let executor = ToolExecutor::new(Arc::clone(&manager), None);
        let agent = AgentLoop::new(Arc::clone(&manager), executor, SharedConfig::default());

        let internal = crate::registry::client_state::INTERNAL_CLIENT_ID;
        manager
            .register_local_tool(
                "add",
                "adds numbers",
                serde_json::json!({"type": "object"}),
                Arc::new(|_args| Box::pin(async { Ok("3".to_string()) })),
            )
            .await
            .unwrap();

        let resp = LlmResponse::Chat(ChatResponse::single(
            ChatMessage::assistant_with_tool_calls(vec![ChatToolCall {
                id: "1".into(),
                name: format!("{internal}-add"),
                arguments: "{\"x\":1,\"y\":2}".into(),
            }]),
            "tool_calls",
        ));
        let stop_resp = ChatResponse::single(ChatMessage::assistant("3"), "stop");
        let llm = ScriptedLlm { responses: Mutex::new(vec![stop_resp]), calls: AtomicU32::new(0) };

        let outcome = agent
            .run(request(), resp, &llm, &RequestFilter::unrestricted(), None, "turn-1".into())
            .await
            .unwrap();

        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.executed_results.len(), 1);
        assert_eq!(outcome.executed_results[0].content, "3");
        match outcome.response {
            LlmResponse::Chat(r) => assert_eq!(r.choices[0].message.content.as_deref(), Some("3")),
            _ => panic!("wrong shape"),
        }
    }

    #[tokio::test]
    async fn mixed_auto_and_approval_synthesizes_executed_tools_response() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager
            .register_local_tool(
                "add",
                "adds numbers",
                serde_json::json!({"type": "object"}),
                Arc::new(|_args| Box::pin(async { Ok("3".to_string()) })),
            )
            .await
            .unwrap();
        let executor = ToolExecutor::new(Arc::clone(&manager), None);
        let agent = AgentLoop::new(Arc::clone(&manager), executor, SharedConfig::default());
        let internal = crate::registry::client_state::INTERNAL_CLIENT_ID;

        let resp = LlmResponse::Chat(ChatResponse::single(
            ChatMessage::assistant_with_tool_calls(vec![
                ChatToolCall {
                    id: "1".into(),
                    name: format!("{internal}-add"),
                    arguments: "{\"x\":1,\"y\":2}".into(),
                },
                ChatToolCall {
                    id: "2".into(),
                    name: "dangerous-drop".into(),
                    arguments: "{}".into(),
                },
            ]),
            "tool_calls",
        ));
        let llm = ScriptedLlm { responses: Mutex::new(vec![]), calls: AtomicU32::new(0) };

        let outcome = agent
            .run(request(), resp, &llm, &RequestFilter::unrestricted(), None, "turn-1".into())
            .await
            .unwrap();

        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.executed_results.len(), 1);
        match outcome.response {
            LlmResponse::Chat(r) => {
                let msg = &r.choices[0].message;
                assert!(msg.content.as_ref().unwrap().starts_with("The Output from allowed tools calls is - "));
                assert!(msg.content.as_ref().unwrap().contains("\"add\":\"3\""));
                let pending = msg.tool_calls.as_ref().unwrap();
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].name, "dangerous-drop");
            }
            _ => panic!("wrong shape"),
        }
    }

    #[tokio::test]
    async fn agent_terminates_within_max_depth() {
        let manager = ConnectionManager::new(SharedConfig::default());
        manager
            .register_local_tool(
                "add",
                "adds numbers",
                serde_json::json!({"type": "object"}),
                Arc::new(|_args| Box::pin(async { Ok("3".to_string()) })),
            )
            .await
            .unwrap();
        manager.config().update(None, Some(2), None).unwrap();
        let executor = ToolExecutor::new(Arc::clone(&manager), None);
        let agent = AgentLoop::new(Arc::clone(&manager), executor, manager.config());
        let internal = crate::registry::client_state::INTERNAL_CLIENT_ID;

        let call = ChatToolCall { id: "1".into(), name: format!("{internal}-add"), arguments: "{}".into() };
        let resp = LlmResponse::Chat(ChatResponse::single(ChatMessage::assistant_with_tool_calls(vec![call.clone()]), "tool_calls"));
        // The LLM keeps asking for another tool call forever; max depth must
        // still cut the loop off.
        let repeat_resp = ChatResponse::single(ChatMessage::assistant_with_tool_calls(vec![call]), "tool_calls");
        let llm = ScriptedLlm { responses: Mutex::new(vec![repeat_resp.clone(), repeat_resp]), calls: AtomicU32::new(0) };

        let outcome = agent
            .run(request(), resp, &llm, &RequestFilter::unrestricted(), None, "turn-1".into())
            .await
            .unwrap();

        assert!(llm.calls.load(Ordering::SeqCst) <= 2);
        assert!(!outcome.executed_results.is_empty());
    }
}
