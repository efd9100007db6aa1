use std::sync::Arc;

use crate::tools::{self, GeminiTool, ToolContext};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 protocol types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[allow(dead_code)]
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ToolContent {
    r#type: &'static str,
    text: String,
}

#[derive(Debug, Serialize)]
struct ToolCallResult {
    content: Vec<ToolContent>,
    #[serde(rename = "isError")]
    is_error: bool,
}

impl JsonRpcResponse {
    fn result(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// What one line of input turns into.
#[derive(Debug)]
pub enum Incoming {
    /// Blank line or notification: nothing to send.
    Ignore,
    /// Rejected before dispatch.
    Reply(JsonRpcResponse),
    Request(JsonRpcRequest),
}

pub fn parse_line(line: &str) -> Incoming {
    if line.trim().is_empty() {
        return Incoming::Ignore;
    }

    let raw: Value = match serde_json::from_str(line) {
        Ok(v) => v,
        Err(e) => return Incoming::Reply(JsonRpcResponse::error(None, -32700, format!("parse error: {e}"))),
    };

    // Notifications have no "id" key and get no response.
    let id = match raw.as_object() {
        Some(o) => match o.get("id") {
            Some(id) => id.clone(),
            None => return Incoming::Ignore,
        },
        None => {
            return Incoming::Reply(JsonRpcResponse::error(
                None,
                -32600,
                "invalid request: expected an object",
            ))
        }
    };

    match serde_json::from_value(raw) {
        Ok(req) => Incoming::Request(req),
        Err(e) => Incoming::Reply(JsonRpcResponse::error(
            Some(id),
            -32600,
            format!("invalid request: {e}"),
        )),
    }
}

// ---------------------------------------------------------------------------
// Server loop
// ---------------------------------------------------------------------------

/// Serve until stdin closes. `tools/call` requests run concurrently; every
/// other method is answered inline, in arrival order.
pub async fn run(ctx: Arc<ToolContext>) -> anyhow::Result<()> {
    let tools: Arc<Vec<Box<dyn GeminiTool>>> = Arc::new(tools::all_tools());
    let (tx, mut rx) = mpsc::channel::<JsonRpcResponse>(64);

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(resp) = rx.recv().await {
            let mut line = serde_json::to_vec(&resp)?;
            line.push(b'\n');
            stdout.write_all(&line).await?;
            stdout.flush().await?;
        }
        anyhow::Ok(())
    });

    tracing::info!(tools = tools.len(), "mcp server ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut in_flight = JoinSet::new();

    while let Some(line) = lines.next_line().await? {
        while let Some(done) = in_flight.try_join_next() {
            log_join(done);
        }

        let req = match parse_line(&line) {
            Incoming::Ignore => continue,
            Incoming::Reply(resp) => {
                tx.send(resp).await?;
                continue;
            }
            Incoming::Request(req) => req,
        };

        if req.method == "tools/call" {
            let (tools, ctx, tx) = (Arc::clone(&tools), Arc::clone(&ctx), tx.clone());
            in_flight.spawn(async move {
                let resp = handle_request(&req, &tools, &ctx).await;
                // The writer only stops once every sender is gone.
                let _ = tx.send(resp).await;
            });
        } else {
            let resp = handle_request(&req, &tools, &ctx).await;
            tx.send(resp).await?;
        }
    }

    tracing::debug!(pending = in_flight.len(), "stdin closed");
    while let Some(done) = in_flight.join_next().await {
        log_join(done);
    }
    drop(tx);
    writer.await??;
    Ok(())
}

fn log_join(done: Result<(), tokio::task::JoinError>) {
    if let Err(e) = done {
        tracing::error!("tool call task failed: {e}");
    }
}

// ---------------------------------------------------------------------------
// Request dispatch (pub for unit tests)
// ---------------------------------------------------------------------------

pub async fn handle_request(
    req: &JsonRpcRequest,
    tools: &[Box<dyn GeminiTool>],
    ctx: &ToolContext,
) -> JsonRpcResponse {
    let id = req.id.clone();
    match req.method.as_str() {
        "initialize" => JsonRpcResponse::result(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "gemini-mcp",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        ),

        "ping" => JsonRpcResponse::result(id, serde_json::json!({})),

        "tools/list" => {
            let tool_list: Vec<Value> = tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name(),
                        "description": t.description(),
                        "inputSchema": t.schema()
                    })
                })
                .collect();
            JsonRpcResponse::result(id, serde_json::json!({ "tools": tool_list }))
        }

        "tools/call" => {
            let Some(params) = &req.params else {
                return JsonRpcResponse::error(id, -32602, "missing params");
            };
            let Some(tool_name) = params["name"].as_str() else {
                return JsonRpcResponse::error(id, -32602, "missing tool name in params");
            };
            let Some(tool) = tools.iter().find(|t| t.name() == tool_name) else {
                return JsonRpcResponse::error(id, -32601, format!("tool not found: {tool_name}"));
            };

            let args = params.get("arguments").cloned().unwrap_or(Value::Null);
            tracing::info!(tool = tool_name, "tool call");
            let (text, is_error) = match tool.call(args, ctx).await {
                Ok(text) => (text, false),
                Err(e) => {
                    tracing::warn!(tool = tool_name, "tool call failed");
                    (e, true)
                }
            };

            let call_result = ToolCallResult {
                content: vec![ToolContent {
                    r#type: "text",
                    text,
                }],
                is_error,
            };
            JsonRpcResponse::result(
                id,
                serde_json::to_value(&call_result)
                    .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()})),
            )
        }

        other => JsonRpcResponse::error(id, -32601, format!("method not found: {other}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
