//! Tool Fabric (C3): schema normalization, local/remote tool execution and
//! result normalization (spec.md §4.3), plus the embedded filesystem tool
//! server that is one concrete Remote Tool Session transport (spec.md
//! §4.4).

pub mod embedded_fs;
pub mod fabric;
pub mod server;

pub use fabric::{ToolFabric, ToolHandler, ToolResult};
pub use server::serve_embedded;
