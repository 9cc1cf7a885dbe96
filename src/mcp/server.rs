//! MCP stdio server loop: newline-delimited JSON-RPC 2.0 over stdin/stdout.
//! Grounded on `mcp/server.rs`'s request/response handling, rehosted from
//! the teacher's raw-HTTP transport onto the conventional MCP stdio
//! transport per §6.

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use super::dispatcher::ToolDispatcher;
use super::types::{
    InitializeResult, JsonRpcId, JsonRpcRequest, JsonRpcResponse, ServerCapabilities, ServerInfo,
    ToolCallParams, ToolsCapability, INVALID_PARAMS, MCP_PROTOCOL_VERSION, METHOD_NOT_FOUND, PARSE_ERROR,
    SERVER_NAME, SERVER_VERSION,
};

/// Runs until stdin closes. Each line is one JSON-RPC envelope; a line that
/// fails to parse gets a parse-error response rather than killing the loop,
/// since a malformed line is the client's problem, not ours.
pub async fn run(dispatcher: ToolDispatcher) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                let response = JsonRpcResponse::failure(JsonRpcId::Null, PARSE_ERROR, err.to_string());
                write_response(&mut stdout, &response).await?;
                continue;
            }
        };

        let is_notification = request.id.is_none();
        let id = request.id.clone().unwrap_or(JsonRpcId::Null);
        let response = handle_request(&dispatcher, request).await;

        // A request with no `id` is a notification: the client never reads
        // a reply, so we must not send one.
        if !is_notification {
            write_response(&mut stdout, &response.with_id(id)).await?;
        }
    }

    Ok(())
}

async fn write_response(stdout: &mut tokio::io::Stdout, response: &JsonRpcResponse) -> anyhow::Result<()> {
    let mut line = serde_json::to_string(response)?;
    line.push('\n');
    stdout.write_all(line.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

/// Builds a response without an `id` attached; the caller fills it in so a
/// notification can be detected and suppressed before a reply is written.
struct PendingResponse {
    result: Option<Value>,
    error: Option<(i64, String)>,
}

impl PendingResponse {
    fn ok(result: Value) -> Self {
        PendingResponse { result: Some(result), error: None }
    }

    fn err(code: i64, message: impl Into<String>) -> Self {
        PendingResponse { result: None, error: Some((code, message.into())) }
    }

    fn with_id(self, id: JsonRpcId) -> JsonRpcResponse {
        match self.error {
            Some((code, message)) => JsonRpcResponse::failure(id, code, message),
            None => JsonRpcResponse::success(id, self.result.unwrap_or(Value::Null)),
        }
    }
}

async fn handle_request(dispatcher: &ToolDispatcher, request: JsonRpcRequest) -> PendingResponse {
    match request.method.as_str() {
        "initialize" => PendingResponse::ok(
            serde_json::to_value(InitializeResult {
                protocol_version: MCP_PROTOCOL_VERSION,
                capabilities: ServerCapabilities { tools: ToolsCapability { list_changed: false } },
                server_info: ServerInfo { name: SERVER_NAME, version: SERVER_VERSION },
            })
            .expect("InitializeResult is always representable as JSON"),
        ),

        "ping" => PendingResponse::ok(json!({})),

        "tools/list" => {
            let tools = dispatcher.list_tools();
            PendingResponse::ok(json!({ "tools": tools }))
        }

        "tools/call" => {
            let params: ToolCallParams = match request.params {
                Some(params) => match serde_json::from_value(params) {
                    Ok(params) => params,
                    Err(err) => return PendingResponse::err(INVALID_PARAMS, err.to_string()),
                },
                None => return PendingResponse::err(INVALID_PARAMS, "missing params"),
            };
            let result = dispatcher.call_tool(&params.name, params.arguments).await;
            PendingResponse::ok(
                serde_json::to_value(result).expect("ToolCallResult is always representable as JSON"),
            )
        }

        "notifications/initialized" => PendingResponse::ok(Value::Null),

        other => PendingResponse::err(METHOD_NOT_FOUND, format!("unknown method: {other}")),
    }
}
