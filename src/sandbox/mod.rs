//! Code-mode sandbox (spec §2 row 8, §4.8): the virtual file system, stub
//! generation, static extractor, and restricted interpreter wired together
//! behind the four meta-tools the agent loop special-cases.

pub mod extractor;
pub mod interpreter;
pub mod stub;
pub mod vfs;

use std::time::Duration;

use serde_json::Value;

use crate::config::BindingLevel;
use crate::connection_manager::ClientSnapshot;
use crate::error::SandboxError;
use crate::executor::ToolExecutor;
use crate::policy::RequestFilter;
use crate::request_id::RequestContext;

use interpreter::{ExecutionOutcome, InterpreterError, ToolJob};

/// Tool names the agent loop recognizes as sandbox meta-tools rather than
/// routing them to a connected client (spec §4.7 step 2, §4.8).
pub const LIST_TOOL_FILES: &str = "listToolFiles";
pub const READ_TOOL_FILE: &str = "readToolFile";
pub const GET_TOOL_DOCS: &str = "getToolDocs";
pub const EXECUTE_TOOL_CODE: &str = "executeToolCode";

pub fn is_meta_tool(name: &str) -> bool {
    matches!(name, LIST_TOOL_FILES | READ_TOOL_FILE | GET_TOOL_DOCS | EXECUTE_TOOL_CODE)
}

/// Outcome of one `executeToolCode` run, classified per spec §4.8 steps 6-7.
#[derive(Debug)]
pub enum CodeOutcome {
    /// Step 2: the trimmed program was empty.
    NoData,
    /// Ran to completion and produced a `result` value.
    Success { result: Value, logs: Vec<String> },
    /// Step 7: ran to completion but bound neither `result` nor any `print` output.
    CompletedNoData { logs: Vec<String> },
    /// Step 6: syntax or runtime failure, with a context-aware hint where one applies.
    Error { message: String, hint: Option<String> },
}

/// Run one `executeToolCode` program end to end (spec §4.8 Execute pipeline).
///
/// Tool calls the program makes are bridged back through `executor` on the
/// calling task's own tokio runtime: the interpreter runs on a blocking
/// thread and hands each call off over a single-slot channel (spec §5),
/// blocking synchronously on the reply so the interpreter never runs two
/// tool calls concurrently.
pub async fn execute_tool_code(
    executor: &ToolExecutor,
    snapshots: &[ClientSnapshot],
    request_filter: &RequestFilter,
    ctx: &RequestContext,
    raw_code: &str,
    timeout: Duration,
) -> CodeOutcome {
    // Step 1: literal `\n` escapes in the transmitted source become real newlines.
    let code = raw_code.replace("\\n", "\n");
    // Step 2: empty-after-trim is a structured no-data result, not an error.
    if code.trim().is_empty() {
        return CodeOutcome::NoData;
    }

    let client_names: Vec<String> = snapshots
        .iter()
        .filter(|s| s.is_code_mode_client && s.connected)
        .map(|s| s.name.clone())
        .collect();

    let (job_tx, job_rx) = std::sync::mpsc::sync_channel::<ToolJob>(1);
    let executor = executor.clone();
    let request_filter = request_filter.clone();
    let ctx = ctx.clone();
    // `Handle::current()` only resolves inside a thread the Tokio runtime
    // itself drives; this bridge is a bare `std::thread`, so the handle must
    // be captured here (on the caller's tokio-managed task) and moved in.
    let handle = tokio::runtime::Handle::current();

    let bridge = std::thread::spawn(move || {
        while let Ok(job) = job_rx.recv() {
            let reply = handle.block_on(dispatch(&executor, &request_filter, &ctx, job.server, job.tool, job.kwargs));
            let _ = job.reply.send(reply);
        }
    });

    let code_for_thread = code.clone();
    let names_for_thread = client_names.clone();
    let run_result = tokio::time::timeout(
        timeout,
        tokio::task::spawn_blocking(move || interpreter::run(&code_for_thread, &names_for_thread, job_tx)),
    )
    .await;

    let outcome = match run_result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => {
            return CodeOutcome::Error {
                message: format!("interpreter thread panicked: {join_err}"),
                hint: None,
            }
        }
        Err(_) => {
            return CodeOutcome::Error {
                message: format!("executeToolCode timed out after {}s", timeout.as_secs()),
                hint: Some("split the program into smaller tool calls or raise sandbox_execution_timeout_secs".to_string()),
            }
        }
    };

    let _ = bridge.join();
    classify(outcome)
}

async fn dispatch(
    executor: &ToolExecutor,
    request_filter: &RequestFilter,
    ctx: &RequestContext,
    server: String,
    tool: String,
    kwargs: std::collections::HashMap<String, Value>,
) -> Result<String, String> {
    let prefixed = crate::registry::naming::prefixed_name(&server, &tool);
    let arguments = serde_json::to_string(&Value::Object(kwargs.into_iter().collect())).unwrap_or_else(|_| "{}".to_string());
    let call = crate::adapter::ExtractedToolCall {
        id: format!("sandbox:{server}.{tool}"),
        name: prefixed,
        arguments,
    };
    let child_ctx = ctx.child(None, &tool);
    executor
        .execute(&call, request_filter, &child_ctx)
        .await
        .map(|r| r.content)
        .map_err(|e| e.to_string())
}

fn classify(outcome: ExecutionOutcome) -> CodeOutcome {
    if let Some(err) = outcome.error {
        let (message, hint) = match &err {
            InterpreterError::Syntax(m) => (format!("syntax error: {m}"), Some("check indentation and parentheses".to_string())),
            InterpreterError::Runtime(m) => {
                let lower = m.to_lowercase();
                let hint = if lower.contains("not defined") {
                    Some("check the server/tool name spelling against listToolFiles".to_string())
                } else if lower.contains("not callable") {
                    Some("attribute error: only registered tool methods and dict.get are callable".to_string())
                } else if lower.contains("requires a key argument") || lower.contains("get(") {
                    Some("dict lookups need a literal key, e.g. result.get(\"key\", default)".to_string())
                } else {
                    None
                };
                (format!("runtime error: {m}"), hint)
            }
        };
        return CodeOutcome::Error { message, hint };
    }

    match outcome.result {
        Some(result) => CodeOutcome::Success { result, logs: outcome.logs },
        // Step 7 scopes "completed but no data" to neither logs nor result
        // being produced; a print-only program still ran successfully.
        None if outcome.logs.is_empty() => CodeOutcome::CompletedNoData { logs: outcome.logs },
        None => CodeOutcome::Success { result: Value::Null, logs: outcome.logs },
    }
}

/// `listToolFiles` meta-tool body (spec §4.8).
pub fn list_tool_files(snapshots: &[ClientSnapshot], binding_level: BindingLevel) -> Vec<String> {
    vfs::list_tool_files(snapshots, binding_level)
}

/// `readToolFile` meta-tool body (spec §4.8).
pub fn read_tool_file(
    snapshots: &[ClientSnapshot],
    binding_level: BindingLevel,
    path: &str,
    start_line: Option<usize>,
    end_line: Option<usize>,
) -> Result<String, SandboxError> {
    vfs::read_tool_file(snapshots, binding_level, path, start_line, end_line)
}

/// `getToolDocs` meta-tool body (spec §4.8).
pub fn get_tool_docs(snapshots: &[ClientSnapshot], client: &str, tool_name: &str) -> Result<String, SandboxError> {
    vfs::get_tool_docs(snapshots, client, tool_name)
}
