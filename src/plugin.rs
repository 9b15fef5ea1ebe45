//! Plugin middleware pipeline (spec §6 external collaborator).
//!
//! A global `once_cell::sync::Lazy<Mutex<Vec<...>>>` hook registry that
//! every executor reaches into implicitly works for a single in-process
//! caller, but doesn't fit a connection-pooled tool core where multiple
//! independent callers may want different pipelines (or none). This keeps
//! the same before/after, short-circuit-capable shape but as a single
//! constructor-injected trait instead: no process-global state, and the
//! sandbox/executor hold an `Option<Arc<dyn PluginPipeline>>` passed in at
//! construction time.

use async_trait::async_trait;
use serde_json::Value;

use crate::request_id::RequestContext;

/// A tool call about to be sent to a transport.
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub client_name: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// The result of a completed (or short-circuited) tool call.
#[derive(Debug, Clone)]
pub struct ToolCallResponse {
    pub content: String,
}

/// What a pre-hook chain decided, per spec §4.9 table `PluginShortCircuit`.
pub enum PreHookOutcome {
    /// Run the (possibly rewritten) request through the transport as normal.
    Continue(ToolCallRequest),
    /// Skip the transport call; still run post-hooks with this response.
    ShortCircuitResponse(ToolCallResponse),
    /// Skip the transport call and post-hooks that would observe a
    /// response; surface this error to the caller.
    ShortCircuitError(String),
}

#[async_trait]
pub trait PluginPipeline: Send + Sync {
    /// Run every registered pre-hook in order. Returns the (possibly
    /// modified) request to execute, or a short-circuit outcome, plus how
    /// many hooks actually ran (`run_from_index` in spec terms) so the
    /// matching number of post-hooks can be invoked afterward.
    async fn run_pre_hooks(
        &self,
        ctx: &RequestContext,
        request: ToolCallRequest,
    ) -> anyhow::Result<(PreHookOutcome, usize)>;

    /// Run post-hooks `0..hooks_ran` in order. `result` is `Err` when the
    /// transport call (or a short-circuit) failed; post-hooks may replace
    /// the response but can't turn a success into a failure or vice versa
    /// in this design — they observe and may rewrite the response body.
    async fn run_post_hooks(
        &self,
        ctx: &RequestContext,
        result: Result<ToolCallResponse, String>,
        hooks_ran: usize,
    ) -> Result<ToolCallResponse, String>;
}

/// Run a tool call through an optional pipeline, per spec §4.9: "If no
/// plugin pipeline is available, the call executes directly."
pub async fn run_with_pipeline<F, Fut>(
    pipeline: Option<&(dyn PluginPipeline)>,
    ctx: &RequestContext,
    request: ToolCallRequest,
    execute: F,
) -> Result<ToolCallResponse, String>
where
    F: FnOnce(ToolCallRequest) -> Fut,
    Fut: std::future::Future<Output = Result<ToolCallResponse, String>>,
{
    let Some(pipeline) = pipeline else {
        return execute(request).await;
    };

    let (outcome, hooks_ran) = match pipeline.run_pre_hooks(ctx, request).await {
        Ok(v) => v,
        Err(e) => return Err(e.to_string()),
    };

    let result = match outcome {
        PreHookOutcome::Continue(req) => execute(req).await,
        PreHookOutcome::ShortCircuitResponse(resp) => Ok(resp),
        PreHookOutcome::ShortCircuitError(e) => Err(e),
    };

    pipeline.run_post_hooks(ctx, result, hooks_ran).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_id::RequestContext;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPipeline {
        pre_calls: AtomicUsize,
        post_calls: AtomicUsize,
    }

    #[async_trait]
    impl PluginPipeline for CountingPipeline {
        async fn run_pre_hooks(
            &self,
            _ctx: &RequestContext,
            request: ToolCallRequest,
        ) -> anyhow::Result<(PreHookOutcome, usize)> {
            self.pre_calls.fetch_add(1, Ordering::SeqCst);
            Ok((PreHookOutcome::Continue(request), 1))
        }

        async fn run_post_hooks(
            &self,
            _ctx: &RequestContext,
            result: Result<ToolCallResponse, String>,
            _hooks_ran: usize,
        ) -> Result<ToolCallResponse, String> {
            self.post_calls.fetch_add(1, Ordering::SeqCst);
            result
        }
    }

    #[tokio::test]
    async fn runs_directly_when_no_pipeline() {
        let ctx = RequestContext::root("exec_1_add".into());
        let req = ToolCallRequest {
            client_name: "calc".into(),
            tool_name: "add".into(),
            arguments: Value::Null,
        };
        let result = run_with_pipeline(None, &ctx, req, |_| async {
            Ok(ToolCallResponse { content: "3".into() })
        })
        .await
        .unwrap();
        assert_eq!(result.content, "3");
    }

    #[tokio::test]
    async fn short_circuit_response_skips_transport_but_runs_post_hooks() {
        struct ShortCircuiting;

        #[async_trait]
        impl PluginPipeline for ShortCircuiting {
            async fn run_pre_hooks(
                &self,
                _ctx: &RequestContext,
                _request: ToolCallRequest,
            ) -> anyhow::Result<(PreHookOutcome, usize)> {
                Ok((
                    PreHookOutcome::ShortCircuitResponse(ToolCallResponse {
                        content: "cached".into(),
                    }),
                    1,
                ))
            }

            async fn run_post_hooks(
                &self,
                _ctx: &RequestContext,
                result: Result<ToolCallResponse, String>,
                hooks_ran: usize,
            ) -> Result<ToolCallResponse, String> {
                assert_eq!(hooks_ran, 1);
                result
            }
        }

        let ctx = RequestContext::root("exec_1_add".into());
        let req = ToolCallRequest {
            client_name: "calc".into(),
            tool_name: "add".into(),
            arguments: Value::Null,
        };
        let pipeline = ShortCircuiting;
        let result = run_with_pipeline(Some(&pipeline), &ctx, req, |_| async {
            panic!("transport should not be called")
        })
        .await
        .unwrap();
        assert_eq!(result.content, "cached");
    }

    #[tokio::test]
    async fn pre_and_post_hooks_both_invoked_on_normal_path() {
        let pipeline = CountingPipeline {
            pre_calls: AtomicUsize::new(0),
            post_calls: AtomicUsize::new(0),
        };
        let ctx = RequestContext::root("exec_1_add".into());
        let req = ToolCallRequest {
            client_name: "calc".into(),
            tool_name: "add".into(),
            arguments: Value::Null,
        };
        let _ = run_with_pipeline(Some(&pipeline), &ctx, req, |_| async {
            Ok(ToolCallResponse { content: "3".into() })
        })
        .await
        .unwrap();
        assert_eq!(pipeline.pre_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.post_calls.load(Ordering::SeqCst), 1);
    }
}
