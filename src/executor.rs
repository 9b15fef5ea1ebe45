//! Tool Executor (spec §2 row 7, §4.5).
//!
//! Retry/backoff follows an exponential scheme with a non-retryable-error
//! classifier; dispatch follows an on-demand connect-then-call pattern,
//! generalized to the uniform, shape-neutral tool call this core exposes.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::adapter::{ExtractedToolCall, ToolExecutionResult};
use crate::adapter::chat::ToolCallMetadata;
use crate::connection_manager::ConnectionManager;
use crate::error::{ExecutorError, McpCoreError};
use crate::plugin::{run_with_pipeline, PluginPipeline, ToolCallRequest, ToolCallResponse};
use crate::policy::{is_visible, RequestFilter};
use crate::registry::naming::strip_client_prefix;
use crate::request_id::RequestContext;
use std::sync::Arc;

const ERROR_PREFIX: &str = "Error: ";

#[derive(Clone)]
pub struct ToolExecutor {
    manager: Arc<ConnectionManager>,
    pipeline: Option<Arc<dyn PluginPipeline>>,
}

impl ToolExecutor {
    pub fn new(manager: Arc<ConnectionManager>, pipeline: Option<Arc<dyn PluginPipeline>>) -> Self {
        Self { manager, pipeline }
    }

    /// `Execute(request)` (spec §4.5). `call.name` is a prefixed tool name
    /// (`"<clientName>-<mcpToolName>"`); the caller is responsible for
    /// shape conversion (handled upstream by [`crate::adapter`]).
    pub async fn execute(
        &self,
        call: &ExtractedToolCall,
        request_filter: &RequestFilter,
        ctx: &RequestContext,
    ) -> Result<ToolExecutionResult, McpCoreError> {
        let started = Instant::now();

        // Step 2: look up the owning client.
        let snapshot = self
            .manager
            .owner_of_prefixed_tool(&call.name)
            .ok_or_else(|| ExecutorError::ToolNotFound(call.name.clone()))?;

        // Step 4a: strip the client prefix.
        let unprefixed = strip_client_prefix(&snapshot.name, &call.name)
            .ok_or_else(|| ExecutorError::ToolNotFound(call.name.clone()))?;

        // Step 1: policy visibility.
        if !is_visible(&snapshot, unprefixed, request_filter) {
            return Err(ExecutorError::ToolForbidden(call.name.clone()).into());
        }

        if !snapshot.connected {
            return Err(ExecutorError::ClientDisconnected(snapshot.name.clone(), call.name.clone()).into());
        }

        // Step 3: parse arguments (empty string => empty object).
        let arguments: Value = if call.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&call.arguments).map_err(ExecutorError::InvalidArguments)?
        };

        // Several MCP servers reject explicit `null`s, so they're dropped
        // recursively between step 3 (parse JSON) and step 5 (invoke transport).
        let arguments = clean_value(arguments);

        // Step 4b: sanitized -> original MCP tool name.
        let sanitized = crate::registry::naming::sanitize_tool_name(&call.name)
            .map_err(|_| ExecutorError::ToolNotFound(call.name.clone()))?;
        let original_name = snapshot
            .name_mapping
            .get(&sanitized)
            .cloned()
            .unwrap_or_else(|| unprefixed.to_string());

        let timeout = self.manager.call_timeout();
        let transport = snapshot
            .conn
            .clone()
            .ok_or_else(|| ExecutorError::ClientDisconnected(snapshot.name.clone(), call.name.clone()))?;

        let plugin_request = ToolCallRequest {
            client_name: snapshot.name.clone(),
            tool_name: original_name.clone(),
            arguments: arguments.clone(),
        };

        let pipeline_ref = self.pipeline.as_deref();
        let call_name = call.name.clone();
        let client_name = snapshot.name.clone();
        let exec_result = run_with_pipeline(pipeline_ref, ctx, plugin_request, move |req| {
            let transport = transport.clone();
            async move {
                let args_map: HashMap<String, Value> = match req.arguments {
                    Value::Object(map) => map.into_iter().collect(),
                    other => {
                        let mut m = HashMap::new();
                        if !other.is_null() {
                            m.insert("value".to_string(), other);
                        }
                        m
                    }
                };
                // Step 5: invoke transport under a per-call timeout.
                let call_result = tokio::time::timeout(timeout, transport.call_tool(&req.tool_name, args_map))
                    .await
                    .map_err(|_| format!("tool '{call_name}' timed out after {}ms", timeout.as_millis()))?
                    .map_err(|e| e.to_string())?;

                // Step 6: extract text from typed content blocks.
                let text = call_result.joined_text();
                // Step 7: literal "Error: " prefix marks a logical error.
                if let Some(rest) = text.strip_prefix(ERROR_PREFIX) {
                    return Err(rest.to_string());
                }
                Ok(ToolCallResponse { content: text })
            }
        })
        .await;

        let elapsed_ms = started.elapsed().as_millis() as u64;

        match exec_result {
            Ok(ToolCallResponse { content }) => Ok(ToolExecutionResult {
                tool_call_id: call.id.clone(),
                content,
                metadata: ToolCallMetadata {
                    client_name: Some(client_name),
                    original_tool_name: Some(original_name),
                    elapsed_ms: Some(elapsed_ms),
                },
            }),
            Err(message) => Err(ExecutorError::ToolExecution(call.name.clone(), message).into()),
        }
    }
}

/// Runtime-extracted outcome of a failed tool call, formatted as a tool
/// message the LLM can see (spec §4.7 "Failure per tool").
pub fn format_tool_failure(tool_name: &str, error: &McpCoreError) -> String {
    format!("{ERROR_PREFIX}tool '{tool_name}' failed: {error}")
}

/// Recursively drop `null`-valued object keys and null array items, dropping
/// objects/arrays that become empty as a result.
fn clean_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let cleaned: serde_json::Map<String, Value> = map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, clean_value(v)))
                .filter(|(_, v)| !is_empty_container(v))
                .collect();
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(clean_value)
                .filter(|v| !is_empty_container(v))
                .collect(),
        ),
        other => other,
    }
}

fn is_empty_container(value: &Value) -> bool {
    matches!(value, Value::Object(m) if m.is_empty()) || matches!(value, Value::Array(a) if a.is_empty())
}

// ---------------------------------------------------------------------------
// Retry (spec §4.5): used for listTools at client-connect time and for
// periodic tool-sync ticks. Exponential backoff, 5 attempts, 1s -> 30s,
// doubled each failure.
// ---------------------------------------------------------------------------

const MAX_RETRY_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Run `op` up to [`MAX_RETRY_ATTEMPTS`] times with exponential backoff,
/// stopping early on a non-transient error.
pub async fn retry_with_backoff<F, Fut, T>(mut op: F) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, String>>,
{
    let mut delay = INITIAL_BACKOFF;
    let mut last_err = String::new();
    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                last_err = e;
                if attempt == MAX_RETRY_ATTEMPTS || !is_transient_error(&last_err) {
                    return Err(last_err);
                }
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }
    }
    Err(last_err)
}

const NON_RETRYABLE_PATTERNS: &[&str] = &[
    "context canceled",
    "context cancelled",
    "deadline exceeded",
    "authentication",
    "unauthorized",
    "forbidden",
    "command not found",
    "permission denied",
];

const TRANSIENT_PATTERNS: &[&str] = &[
    "connection refused",
    "connection reset",
    "timed out",
    "timeout",
    "dns",
    "too many requests",
    "429",
];

/// Classify an error message as transient (worth retrying) per spec §4.5.
/// Non-retryable patterns (auth, 4xx-like, cancellation) are checked first
/// so e.g. "authentication timeout" is not retried.
pub fn is_transient_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    if NON_RETRYABLE_PATTERNS.iter().any(|p| lower.contains(p)) {
        return false;
    }
    if has_4xx_status(&lower) {
        return false;
    }
    if TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }
    has_5xx_status(&lower)
}

fn has_4xx_status(lower: &str) -> bool {
    status_code_in_range(lower, 400, 499)
}

fn has_5xx_status(lower: &str) -> bool {
    status_code_in_range(lower, 500, 599)
}

fn status_code_in_range(lower: &str, low: u32, high: u32) -> bool {
    lower
        .split(|c: char| !c.is_ascii_digit())
        .filter_map(|s| s.parse::<u32>().ok())
        .any(|n| (low..=high).contains(&n))
}
