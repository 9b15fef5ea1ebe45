//! OAuth2 provider (spec §6 external collaborator).
//!
//! Supplies authorization headers for HTTP/SSE transports. The core never
//! performs an OAuth flow itself; it only calls through this trait from a
//! [`crate::transport::HeadersProvider`] implementation.

use std::collections::HashMap;

use async_trait::async_trait;

#[async_trait]
pub trait OAuth2Provider: Send + Sync {
    /// Return the headers (typically an `Authorization: Bearer ...` entry)
    /// to attach to the next request, refreshing the token if needed.
    async fn headers(&self) -> anyhow::Result<HashMap<String, String>>;
}
