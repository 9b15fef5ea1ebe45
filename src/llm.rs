//! LLM caller (spec §6 external collaborator).
//!
//! The agent loop never talks to a model provider directly; it drives this
//! trait once per iteration with the current [`LlmRequest`] and expects the
//! matching [`LlmResponse`] shape back.

use async_trait::async_trait;

use crate::adapter::LlmRequest;
use crate::adapter::LlmResponse;

#[async_trait]
pub trait LlmCaller: Send + Sync {
    /// Issue one completion call. The returned response must be the same
    /// enum variant (`Chat`/`Responses`) as `request`; callers other than
    /// the agent loop that violate this invariant will panic at the first
    /// adapter dispatch site.
    async fn complete(&self, request: &LlmRequest) -> anyhow::Result<LlmResponse>;
}
