//! Remote Tool Session manager (spec.md §4.4): connects to every configured
//! server, caches its capabilities (tools, resources), and dispatches
//! `call_tool`/`read_resource` by server id.
//!
//! Transport precedence per server entry: explicit `url` > `embedded` >
//! `command` (spawn). On failure of the *preferred* transport, the loader
//! falls back to the next one — unless the URL was explicitly configured,
//! in which case there is nothing to fall back to.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::{McpConfig, McpServerConfig, TransportKind};
use crate::protocol::{self, McpToolDef, ToolCallResult, ToolsListResult};
use crate::transport::{McpTransport, NetworkTransport, PipeTransport, TransportError};

/// The normalized result of `call_tool`, matching spec.md §4.4's contract:
/// `{ok, data?, error?, elapsed_ms}`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CallToolResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Cached capabilities for one connected server.
struct Capabilities {
    tools: Vec<McpToolDef>,
    resources: Vec<Value>,
}

/// One Remote Tool Session connection.
pub struct McpServer {
    pub id: String,
    transport: Box<dyn McpTransport>,
    capabilities: RwLock<Capabilities>,
    /// Held only to keep an embedded server's background task alive; never
    /// read, dropped (and the task aborted) on shutdown.
    embedded_handle: Option<tokio::task::JoinHandle<()>>,
}

impl McpServer {
    async fn connect(id: &str, config: &McpServerConfig) -> Result<Self, McpError> {
        let (transport, embedded_handle): (Box<dyn McpTransport>, Option<tokio::task::JoinHandle<()>>) =
            match config.transport_kind() {
                TransportKind::Network => (Box::new(NetworkTransport::new(config.url.clone().unwrap())), None),
                TransportKind::Embedded => {
                    let root = config
                        .root
                        .clone()
                        .ok_or_else(|| McpError::Protocol("embedded server requires a `root`".into()))?;
                    let (addr, handle) = nav_tools::serve_embedded(root.into())
                        .await
                        .map_err(|e| McpError::Transport(TransportError::Io(e)))?;
                    (Box::new(NetworkTransport::new(format!("http://{addr}/rpc"))), Some(handle))
                }
                TransportKind::Pipe => (Box::new(PipeTransport::spawn(config).map_err(McpError::Transport)?), None),
            };

        let capabilities = handshake(transport.as_ref(), id).await?;

        Ok(Self {
            id: id.to_string(),
            transport,
            capabilities: RwLock::new(capabilities),
            embedded_handle,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    pub async fn refresh(&self) -> Result<(), McpError> {
        let fresh = handshake(self.transport.as_ref(), &self.id).await?;
        *self.capabilities.write().await = fresh;
        Ok(())
    }

    pub async fn tools(&self) -> Vec<McpToolDef> {
        self.capabilities.read().await.tools.clone()
    }

    pub async fn resources(&self) -> Vec<Value> {
        self.capabilities.read().await.resources.clone()
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Value, McpError> {
        let resp = self
            .transport
            .send_request("resources/read", Some(serde_json::json!({"uri": uri})))
            .await
            .map_err(McpError::Transport)?;
        resp.into_result().map_err(|e| McpError::Protocol(e.to_string()))
    }

    pub async fn call_tool(&self, tool_name: &str, arguments: Value, timeout: std::time::Duration) -> CallToolResult {
        let start = Instant::now();
        if !self.transport.is_alive() {
            return CallToolResult {
                ok: false,
                data: None,
                error: Some(format!("server is down: {}", self.id)),
                elapsed_ms: start.elapsed().as_millis() as u64,
            };
        }

        let params = serde_json::json!({"name": tool_name, "arguments": arguments});
        let call = tokio::time::timeout(timeout, self.transport.send_request("tools/call", Some(params)));

        match call.await {
            Err(_) => CallToolResult {
                ok: false,
                data: None,
                error: Some(format!("Timeout after {}s", timeout.as_secs())),
                elapsed_ms: start.elapsed().as_millis() as u64,
            },
            Ok(Err(e)) => CallToolResult {
                ok: false,
                data: None,
                error: Some(e.to_string()),
                elapsed_ms: start.elapsed().as_millis() as u64,
            },
            Ok(Ok(resp)) => {
                if resp.is_error() {
                    let err = resp.error.unwrap();
                    return CallToolResult {
                        ok: false,
                        data: None,
                        error: Some(err.to_string()),
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    };
                }
                let result_value = resp.result.unwrap_or(Value::Null);
                let data = extract_tool_data(result_value);
                CallToolResult { ok: true, data: Some(data), error: None, elapsed_ms: start.elapsed().as_millis() as u64 }
            }
        }
    }

    async fn shutdown(&self) {
        self.transport.shutdown().await;
        if let Some(handle) = &self.embedded_handle {
            handle.abort();
        }
    }
}

/// Normalize a `tools/call` result to the caller's preferred shape: a
/// structured JSON value if the single text content item parses as one,
/// else the raw text, else the untouched result value.
fn extract_tool_data(result_value: Value) -> Value {
    match serde_json::from_value::<ToolCallResult>(result_value.clone()) {
        Ok(tcr) if tcr.content.len() == 1 => {
            let text = &tcr.content[0].text;
            serde_json::from_str::<Value>(text).unwrap_or_else(|_| Value::String(text.clone()))
        }
        Ok(tcr) if !tcr.content.is_empty() => {
            Value::Array(tcr.content.into_iter().map(|c| Value::String(c.text)).collect())
        }
        _ => result_value,
    }
}

async fn handshake(transport: &dyn McpTransport, id: &str) -> Result<Capabilities, McpError> {
    let init_params = serde_json::to_value(protocol::initialize_params())
        .map_err(|e| McpError::Protocol(format!("failed to serialize initialize params: {e}")))?;
    let resp = transport.send_request("initialize", Some(init_params)).await.map_err(McpError::Transport)?;
    if resp.is_error() {
        return Err(McpError::Protocol(format!("initialize failed: {}", resp.error.unwrap())));
    }
    let _ = transport.send_notification("notifications/initialized").await;

    let tools_resp = transport.send_request("tools/list", None).await.map_err(McpError::Transport)?;
    let tools = if tools_resp.is_error() {
        tracing::warn!(server_id = id, "tools/list returned error, server will have no tools");
        Vec::new()
    } else {
        serde_json::from_value::<ToolsListResult>(tools_resp.result.unwrap_or(Value::Null))
            .map(|r| r.tools)
            .unwrap_or_default()
    };

    let resources = match transport.send_request("resources/list", None).await {
        Ok(resp) if !resp.is_error() => resp
            .result
            .unwrap_or(Value::Null)
            .get("resources")
            .cloned()
            .unwrap_or(Value::Array(vec![]))
            .as_array()
            .cloned()
            .unwrap_or_default(),
        _ => Vec::new(),
    };

    tracing::info!(server_id = id, tool_count = tools.len(), "remote tool session ready");
    Ok(Capabilities { tools, resources })
}

/// Manager that holds every configured Remote Tool Session.
pub struct McpManager {
    servers: HashMap<String, McpServer>,
}

impl McpManager {
    pub fn empty() -> Self {
        Self { servers: HashMap::new() }
    }

    /// Initialize every non-disabled server from config. A server whose
    /// preferred transport fails falls back to the next one in the
    /// precedence order, unless its `url` was explicitly set (nothing to
    /// fall back to). A server that fails every available transport is
    /// logged and skipped, not fatal.
    pub async fn from_config(config: &McpConfig) -> Self {
        let mut servers = HashMap::new();

        for (id, server_config) in &config.servers {
            if server_config.disabled {
                continue;
            }
            match connect_with_fallback(id, server_config).await {
                Ok(server) => {
                    servers.insert(id.clone(), server);
                }
                Err(e) => {
                    tracing::warn!(server_id = %id, error = %e, "failed to initialize remote tool session, skipping");
                }
            }
        }

        Self { servers }
    }

    pub fn get(&self, server_id: &str) -> Option<&McpServer> {
        self.servers.get(server_id)
    }

    /// Get all discovered tools across all alive servers, as `(server_id, tool_def)`.
    pub async fn list_tools(&self) -> Vec<(String, McpToolDef)> {
        let mut out = Vec::new();
        for server in self.servers.values().filter(|s| s.is_alive()) {
            for tool in server.tools().await {
                out.push((server.id.clone(), tool));
            }
        }
        out
    }

    pub async fn call_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        arguments: Value,
        timeout: std::time::Duration,
    ) -> Result<CallToolResult, McpError> {
        let server = self.servers.get(server_id).ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))?;
        Ok(server.call_tool(tool_name, arguments, timeout).await)
    }

    pub async fn refresh(&self, server_id: &str) -> Result<(), McpError> {
        let server = self.servers.get(server_id).ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))?;
        server.refresh().await
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    pub async fn tool_count(&self) -> usize {
        let mut total = 0;
        for server in self.servers.values().filter(|s| s.is_alive()) {
            total += server.tools().await.len();
        }
        total
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    pub async fn shutdown(&self) {
        let futs: Vec<_> = self.servers.values().map(|s| s.shutdown()).collect();
        futures_util::future::join_all(futs).await;
    }
}

async fn connect_with_fallback(id: &str, config: &McpServerConfig) -> Result<McpServer, McpError> {
    let preferred = config.transport_kind();
    match McpServer::connect(id, config).await {
        Ok(server) => Ok(server),
        Err(e) if preferred == TransportKind::Network => Err(e),
        Err(e) => {
            tracing::warn!(server_id = %id, transport = ?preferred, error = %e, "preferred transport failed, trying fallback");
            let mut fallback = config.clone();
            match preferred {
                TransportKind::Embedded => fallback.embedded_http = None,
                TransportKind::Pipe => return Err(e),
                TransportKind::Network => unreachable!(),
            }
            McpServer::connect(id, &fallback).await
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("remote tool session transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("remote tool session protocol error: {0}")]
    Protocol(String),

    #[error("remote tool session not found: {0}")]
    ServerNotFound(String),
}

impl From<McpError> for nav_domain::error::Error {
    fn from(e: McpError) -> Self {
        nav_domain::error::Error::Other(e.to_string())
    }
}
