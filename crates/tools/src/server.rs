//! In-process hosting for the embedded filesystem tool server (spec.md
//! §4.4: "the process MAY host an in-process tool server over an ephemeral
//! local port"). Speaks the same JSON-RPC 2.0 shape as a pipe-transport MCP
//! server, over a single HTTP POST endpoint, so a Remote Tool Session can
//! connect to it exactly like any other network transport.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::embedded_fs;

#[derive(Clone)]
struct ServerState {
    root: Arc<PathBuf>,
}

/// Bind an ephemeral local port (`0`) and serve the embedded filesystem
/// tools. Returns the bound address and a handle to the background task;
/// dropping the handle does not stop the server — callers abort it
/// explicitly on shutdown.
pub async fn serve_embedded(root: PathBuf) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
    let state = ServerState { root: Arc::new(root) };
    let app = Router::new().route("/rpc", post(handle_rpc)).with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::warn!(error = %e, "embedded tool server exited");
        }
    });
    Ok((addr, handle))
}

async fn handle_rpc(State(state): State<ServerState>, Json(req): Json<Value>) -> Json<Value> {
    let id = req.get("id").cloned().unwrap_or(Value::Null);
    let method = req.get("method").and_then(|m| m.as_str()).unwrap_or("");
    let params = req.get("params").cloned().unwrap_or(Value::Null);

    let result = dispatch(&state, method, params).await;
    match result {
        Ok(value) => Json(serde_json::json!({"jsonrpc": "2.0", "id": id, "result": value})),
        Err(message) => Json(serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32000, "message": message}
        })),
    }
}

async fn dispatch(state: &ServerState, method: &str, params: Value) -> Result<Value, String> {
    match method {
        "initialize" => Ok(serde_json::json!({
            "protocolVersion": "2024-11-05",
            "capabilities": {},
            "serverInfo": {"name": "navagent-embedded-fs", "version": env!("CARGO_PKG_VERSION")},
        })),
        "notifications/initialized" => Ok(Value::Null),
        "tools/list" => Ok(serde_json::json!({ "tools": tool_defs() })),
        "resources/list" => Ok(serde_json::json!({ "resources": [] })),
        "resources/read" => Err("embedded filesystem server exposes no readable resources".into()),
        "tools/call" => {
            let name = params.get("name").and_then(|n| n.as_str()).ok_or("missing tool name")?;
            let args = params.get("arguments").cloned().unwrap_or(Value::Null);
            call_tool(state, name, args).await
        }
        other => Err(format!("unknown method: {other}")),
    }
}

fn tool_defs() -> Vec<Value> {
    vec![
        serde_json::json!({
            "name": "list_directory",
            "description": "List entries in a directory under the tool server root",
            "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}},
        }),
        serde_json::json!({
            "name": "get_file_info",
            "description": "Stat a path under the tool server root",
            "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}}},
        }),
        serde_json::json!({
            "name": "search_files",
            "description": "Recursively search for entries by name substring",
            "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}, "pattern": {"type": "string"}}},
        }),
        serde_json::json!({
            "name": "read_file",
            "description": "Read a file's contents (text if UTF-8, else base64)",
            "inputSchema": {"type": "object", "properties": {"path": {"type": "string"}, "max_bytes": {"type": "integer"}}},
        }),
    ]
}

async fn call_tool(state: &ServerState, name: &str, args: Value) -> Result<Value, String> {
    let schema = tool_defs()
        .into_iter()
        .find(|t| t["name"] == name)
        .map(|t| t["inputSchema"].clone())
        .ok_or_else(|| format!("unknown tool: {name}"))?;
    let obj = match &args {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => return Err(format!("Schema validation failed: arguments must be an object, got {other}")),
    };
    crate::fabric::validate_schema_types(&obj, &schema).map_err(|e| format!("Schema validation failed: {e}"))?;

    let path = obj.get("path").and_then(|p| p.as_str()).unwrap_or("/").to_string();
    match name {
        "list_directory" => embedded_fs::list_directory(&state.root, &path).await,
        "get_file_info" => embedded_fs::get_file_info(&state.root, &path).await,
        "search_files" => {
            let pattern = obj.get("pattern").and_then(|p| p.as_str()).unwrap_or("");
            embedded_fs::search_files(&state.root, &path, pattern).await
        }
        "read_file" => {
            let max_bytes = obj.get("max_bytes").and_then(|v| v.as_u64()).unwrap_or(1_000_000) as usize;
            embedded_fs::read_file(&state.root, &path, max_bytes).await
        }
        other => Err(format!("unknown tool: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_on_ephemeral_port_and_answers_tools_list() {
        let dir = tempfile::TempDir::new().unwrap();
        let (addr, handle) = serve_embedded(dir.path().to_path_buf()).await.unwrap();
        assert_ne!(addr.port(), 0);

        let client = reqwest::Client::new();
        let resp: Value = client
            .post(format!("http://{addr}/rpc"))
            .json(&serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(resp["result"]["tools"].as_array().unwrap().len() >= 4);
        handle.abort();
    }

    #[tokio::test]
    async fn rejects_mistyped_path_argument() {
        let dir = tempfile::TempDir::new().unwrap();
        let (addr, handle) = serve_embedded(dir.path().to_path_buf()).await.unwrap();

        let client = reqwest::Client::new();
        let resp: Value = client
            .post(format!("http://{addr}/rpc"))
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "tools/call",
                "params": {"name": "read_file", "arguments": {"path": 42}},
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(resp["error"]["message"].as_str().unwrap().starts_with("Schema validation failed:"));
        handle.abort();
    }
}
