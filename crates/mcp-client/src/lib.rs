//! `nav-mcp` — Remote Tool Session client (spec.md §4.4).
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types for communicating with remote tool servers.
//! - A pipe transport that spawns child processes and speaks newline-delimited
//!   JSON-RPC over their stdio, and a network transport for HTTP/SSE servers.
//! - An `McpManager` that connects to every configured server, caches their
//!   tool/resource capabilities, and dispatches `call_tool`/`read_resource`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use nav_mcp::{McpConfig, McpManager};
//!
//! let config: McpConfig = /* from TOML */;
//! let manager = McpManager::from_config(&config).await;
//!
//! for (server_id, tool) in manager.list_tools().await {
//!     println!("mcp:{server_id}:{}", tool.name);
//! }
//!
//! let result = manager.call_tool("filesystem", "read_file", json!({"path": "/tmp/test.txt"}), timeout).await?;
//! ```

pub mod config;
pub mod manager;
pub mod protocol;
pub mod transport;

pub use config::{McpConfig, McpServerConfig, TransportKind};
pub use manager::{CallToolResult, McpError, McpManager, McpServer};
pub use protocol::McpToolDef;
