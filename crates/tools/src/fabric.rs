//! Tool Fabric (C3): normalizes tool schemas, executes local/remote tool
//! calls, and normalizes results (spec.md §4.3).

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use nav_domain::chat::{ToolCall, ToolDefinition};
use serde_json::Value;

/// A tool's handler: takes coerced arguments, returns a JSON-encodable
/// result or an error string (never a stack trace, per spec.md §4.3).
pub type ToolHandler =
    Arc<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> + Send + Sync>;

/// One registered callable — either a genuinely local function or a proxy
/// onto a Remote Tool Session (spec.md §4.4). `accepts_variadic` mirrors a
/// Python `**kwargs` signature: when true, coercion does not filter unknown
/// argument keys down to a known parameter set.
#[derive(Clone)]
struct RegisteredTool {
    def: ToolDefinition,
    handler: ToolHandler,
    accepts_variadic: bool,
}

/// The result of one `execute()` call, in the same order as the input
/// `tool_calls` (spec.md §8 property 5: "tool ordering").
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolResult {
    pub id: Option<String>,
    pub name: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Registry + executor for in-process and remote-proxied tools.
///
/// Registration order matters only for name collisions: a later
/// `register_local`/`register_remote` call for the same name replaces the
/// earlier one ("later registrations win", spec.md §4.3).
#[derive(Clone, Default)]
pub struct ToolFabric {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-process tool. Callers provide the normalized
    /// `{name, description, parameters}` schema directly (Rust has no
    /// runtime function-signature introspection the way the original's
    /// dynamically-typed host language does; the schema is written once,
    /// next to the handler, instead of derived).
    pub fn register_local(&mut self, def: ToolDefinition, accepts_variadic: bool, handler: ToolHandler) {
        self.tools.insert(
            def.name.clone(),
            RegisteredTool {
                def,
                handler,
                accepts_variadic,
            },
        );
    }

    /// Import tool declarations from a Remote Tool Session and wrap each as
    /// a local callable that proxies through `call`.
    pub fn register_remote<F>(&mut self, tools: Vec<ToolDefinition>, call: F)
    where
        F: Fn(String, Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>>
            + Send
            + Sync
            + 'static,
    {
        let call = Arc::new(call);
        for def in tools {
            let name = def.name.clone();
            let call = call.clone();
            let handler: ToolHandler = Arc::new(move |args| call(name.clone(), args));
            self.tools.insert(
                def.name.clone(),
                RegisteredTool {
                    def,
                    handler,
                    accepts_variadic: true,
                },
            );
        }
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.def.clone()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Execute a batch of tool calls. Runs concurrently when `parallel` is
    /// true and there is more than one call; otherwise serially in the
    /// given order (spec.md §4.3 "Scheduling"). Always returns results in
    /// input order with matching `id`s.
    pub async fn execute(
        &self,
        tool_calls: &[ToolCall],
        timeout: Duration,
        parallel: bool,
        strict_types: bool,
    ) -> Vec<ToolResult> {
        if parallel && tool_calls.len() > 1 {
            let futs = tool_calls
                .iter()
                .map(|call| self.execute_one(call, timeout, strict_types));
            futures_util::future::join_all(futs).await
        } else {
            let mut out = Vec::with_capacity(tool_calls.len());
            for call in tool_calls {
                out.push(self.execute_one(call, timeout, strict_types).await);
            }
            out
        }
    }

    async fn execute_one(&self, call: &ToolCall, timeout: Duration, strict_types: bool) -> ToolResult {
        let Some(tool) = self.tools.get(&call.name) else {
            return ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                ok: false,
                result: None,
                error: Some(format!("unknown tool: {}", call.name)),
            };
        };

        let args = match coerce_arguments(&call.arguments, &tool.def.parameters, tool.accepts_variadic, strict_types)
        {
            Ok(v) => v,
            Err(e) => {
                return ToolResult {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    ok: false,
                    result: None,
                    error: Some(format!("Schema validation failed: {e}")),
                }
            }
        };

        let handler = tool.handler.clone();
        match tokio::time::timeout(timeout, handler(args)).await {
            Ok(Ok(result)) => ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                ok: true,
                result: Some(normalize_result(result)),
                error: None,
            },
            Ok(Err(e)) => ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                ok: false,
                result: None,
                error: Some(e),
            },
            Err(_) => ToolResult {
                id: call.id.clone(),
                name: call.name.clone(),
                ok: false,
                result: None,
                error: Some(format!("Timeout after {}s", timeout.as_secs())),
            },
        }
    }
}

/// Coerce a model-supplied arguments value into a JSON object, per
/// spec.md §4.3:
///
/// "any of {mapping; JSON string -> mapping; list of {name,value}; list of
/// [k,v] pairs; single scalar -> {value: scalar}}; then filter to the
/// callable's signature unless it accepts variadic keyword args; then
/// apply safe scalar coercion unless strict_types is requested."
fn coerce_arguments(
    raw: &Value,
    schema: &Value,
    accepts_variadic: bool,
    strict_types: bool,
) -> Result<Value, String> {
    let mut obj = match raw {
        Value::Object(map) => map.clone(),
        Value::String(s) => {
            let parsed: Value = serde_json::from_str(s)
                .map_err(|e| format!("arguments string is not valid JSON: {e}"))?;
            match parsed {
                Value::Object(map) => map,
                other => return Err(format!("arguments string did not decode to an object: {other}")),
            }
        }
        Value::Array(items) => {
            let mut map = serde_json::Map::new();
            for item in items {
                match item {
                    Value::Object(pair) if pair.contains_key("name") && pair.contains_key("value") => {
                        let key = pair["name"]
                            .as_str()
                            .ok_or("list-of-{name,value} entry has non-string name")?
                            .to_string();
                        map.insert(key, pair["value"].clone());
                    }
                    Value::Array(kv) if kv.len() == 2 => {
                        let key = kv[0]
                            .as_str()
                            .ok_or("list-of-[k,v] entry has non-string key")?
                            .to_string();
                        map.insert(key, kv[1].clone());
                    }
                    other => return Err(format!("cannot coerce list entry into an argument: {other}")),
                }
            }
            map
        }
        scalar => {
            let mut map = serde_json::Map::new();
            map.insert("value".to_string(), scalar.clone());
            map
        }
    };

    let known_keys: Vec<String> = schema
        .get("properties")
        .and_then(|p| p.as_object())
        .map(|p| p.keys().cloned().collect())
        .unwrap_or_default();

    if !accepts_variadic && !known_keys.is_empty() {
        obj.retain(|k, _| known_keys.contains(k));
    }

    if !strict_types {
        for (_key, value) in obj.iter_mut() {
            *value = coerce_scalar(value.clone());
        }
    }

    validate_schema_types(&obj, schema)?;

    Ok(Value::Object(obj))
}

/// Checks every argument present in `obj` against its declared
/// `properties[k].type` in `schema` (spec.md §7 `SchemaValidation`, S6: a
/// tool expecting `{path: string}` sent `{path: 42}` must fail, not pass
/// through). Runs after scalar coercion, so a `"42"` string that coerced to
/// a number is judged by what it became, not what the model originally
/// sent. Keys the schema doesn't mention, or properties with no `type`,
/// are not constrained.
pub(crate) fn validate_schema_types(obj: &serde_json::Map<String, Value>, schema: &Value) -> Result<(), String> {
    let Some(properties) = schema.get("properties").and_then(|p| p.as_object()) else {
        return Ok(());
    };
    for (key, value) in obj {
        let Some(expected) = properties.get(key).and_then(|p| p.get("type")).and_then(|t| t.as_str()) else {
            continue;
        };
        if !json_value_matches_type(value, expected) {
            return Err(format!("field {key:?} expected type {expected}, got {}", json_type_name(value)));
        }
    }
    Ok(())
}

fn json_value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Safe scalar coercion: `"true"`/`"false"` -> bool, integer/float strings
/// -> numbers. Leaves anything else untouched.
fn coerce_scalar(v: Value) -> Value {
    match v {
        Value::String(ref s) => match s.as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => {
                if let Ok(i) = s.parse::<i64>() {
                    Value::Number(i.into())
                } else if let Ok(f) = s.parse::<f64>() {
                    serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(v)
                } else {
                    v
                }
            }
        },
        other => other,
    }
}

/// Every result must be JSON-encodable; non-encodable values already
/// failed at the handler boundary, so this only needs to guarantee the
/// *shape* a consumer sees is always a `Value` (the `repr`-based fallback
/// of spec.md §4.3 is the handler's responsibility, since Rust handlers
/// already return `Result<Value, String>`).
fn normalize_result(v: Value) -> Value {
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use nav_domain::chat::ToolCall;

    fn echo_def() -> ToolDefinition {
        ToolDefinition {
            name: "echo".into(),
            description: "echo".into(),
            parameters: serde_json::json!({"type": "object", "properties": {"path": {"type": "string"}}}),
        }
    }

    fn echo_handler() -> ToolHandler {
        Arc::new(|args| Box::pin(async move { Ok(args) }))
    }

    #[tokio::test]
    async fn executes_in_input_order_with_matching_ids() {
        let mut fabric = ToolFabric::new();
        fabric.register_local(echo_def(), false, echo_handler());

        let calls = vec![
            ToolCall { id: Some("a".into()), name: "echo".into(), arguments: serde_json::json!({"path": "1"}) },
            ToolCall { id: Some("b".into()), name: "echo".into(), arguments: serde_json::json!({"path": "2"}) },
        ];
        let results = fabric.execute(&calls, Duration::from_secs(1), true, false).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id.as_deref(), Some("a"));
        assert_eq!(results[1].id.as_deref(), Some("b"));
        assert!(results.iter().all(|r| r.ok));
    }

    #[tokio::test]
    async fn unknown_tool_errors_without_panicking() {
        let fabric = ToolFabric::new();
        let calls = vec![ToolCall { id: None, name: "missing".into(), arguments: serde_json::json!({}) }];
        let results = fabric.execute(&calls, Duration::from_secs(1), false, false).await;
        assert!(!results[0].ok);
        assert!(results[0].error.as_ref().unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn coerces_string_arguments_to_mapping() {
        let mut fabric = ToolFabric::new();
        fabric.register_local(echo_def(), false, echo_handler());
        let calls = vec![ToolCall {
            id: None,
            name: "echo".into(),
            arguments: Value::String(r#"{"path": "x"}"#.into()),
        }];
        let results = fabric.execute(&calls, Duration::from_secs(1), false, false).await;
        assert!(results[0].ok);
        assert_eq!(results[0].result.as_ref().unwrap()["path"], "x");
    }

    #[tokio::test]
    async fn coerces_scalar_booleans_and_numbers() {
        let mut fabric = ToolFabric::new();
        fabric.register_local(
            ToolDefinition {
                name: "flag".into(),
                description: "flag".into(),
                parameters: serde_json::json!({"type": "object", "properties": {"on": {}, "n": {}}}),
            },
            false,
            echo_handler(),
        );
        let calls = vec![ToolCall {
            id: None,
            name: "flag".into(),
            arguments: serde_json::json!({"on": "true", "n": "42"}),
        }];
        let results = fabric.execute(&calls, Duration::from_secs(1), false, false).await;
        assert_eq!(results[0].result.as_ref().unwrap()["on"], true);
        assert_eq!(results[0].result.as_ref().unwrap()["n"], 42);
    }

    #[tokio::test]
    async fn mistyped_argument_fails_schema_validation() {
        let mut fabric = ToolFabric::new();
        fabric.register_local(echo_def(), false, echo_handler());
        let calls = vec![ToolCall { id: None, name: "echo".into(), arguments: serde_json::json!({"path": 42}) }];
        let results = fabric.execute(&calls, Duration::from_secs(1), false, false).await;
        assert!(!results[0].ok);
        assert_eq!(results[0].error.as_deref(), Some("Schema validation failed: field \"path\" expected type string, got integer"));
    }

    #[tokio::test]
    async fn timeout_is_recorded_per_call_without_affecting_others() {
        let mut fabric = ToolFabric::new();
        fabric.register_local(
            ToolDefinition {
                name: "slow".into(),
                description: "slow".into(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            },
            false,
            Arc::new(|_args| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(Value::Null)
                })
            }),
        );
        fabric.register_local(echo_def(), false, echo_handler());

        let calls = vec![
            ToolCall { id: Some("slow".into()), name: "slow".into(), arguments: serde_json::json!({}) },
            ToolCall { id: Some("fast".into()), name: "echo".into(), arguments: serde_json::json!({}) },
        ];
        let results = fabric.execute(&calls, Duration::from_millis(5), true, false).await;
        assert!(!results[0].ok);
        assert!(results[0].error.as_ref().unwrap().starts_with("Timeout after"));
        assert!(results[1].ok);
    }
}
