use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// `mcp_config.json`-equivalent: a named table of remote tool servers
/// (spec.md §4.4, §6). Precedence when multiple fields are set on one
/// entry: explicit `url` > `embedded` > `command` (spawn).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpConfig {
    #[serde(default)]
    pub servers: HashMap<String, McpServerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpServerConfig {
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub embedded_http: Option<bool>,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl McpServerConfig {
    pub fn transport_kind(&self) -> TransportKind {
        if self.url.is_some() {
            TransportKind::Network
        } else if self.embedded_http.unwrap_or(false) {
            TransportKind::Embedded
        } else {
            TransportKind::Pipe
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Network,
    Embedded,
    Pipe,
}
