//! Tool Registry (spec §2 row 1, §3).
//!
//! Holds per-client tool metadata, prefixed names, and the
//! sanitized<->original name mapping. The registry itself is plain data;
//! [`crate::connection_manager::ConnectionManager`] owns the `RwLock`
//! guarding concurrent access and performs the network-calling lifecycle
//! operations around it.

pub mod client_state;
pub mod filter_list;
pub mod naming;
pub mod schema;

pub use client_state::{
    CancelHandle, ClientEdit, ClientId, ClientState, ConnectionConfig, ConnectionLifecycle,
    ConnectionType, StdioConfig, ToolSyncOverride, INTERNAL_CLIENT_ID,
};
pub use filter_list::NameFilter;
