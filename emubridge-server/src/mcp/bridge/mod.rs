//! MCP Bridge - Connects MCP protocol to the emulator backend
//!
//! This module implements the MCP bridge that translates between MCP JSON-RPC
//! (over stdio) and backend RPC calls (over the WebSocket link).

pub mod handlers;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Global request counter for log correlation within this bridge instance
static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(1);

use crate::mcp::error::McpError;
use crate::mcp::protocol::{
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolResult, ToolsListResult,
};
use crate::mcp::tools::get_tool_definitions;
use crate::rpc::RpcClient;

use self::handlers::{
    arguments_object, optional_bool, optional_integer, optional_positive_number, optional_string,
    parse_addr, required_integer, required_string, KeyEvent, ToolHandlers,
};

/// MCP Bridge
///
/// Serves MCP over stdio and forwards tool calls to the backend. Cloning is
/// cheap; every in-flight tools/call runs on its own clone.
#[derive(Clone)]
pub struct McpBridge {
    client: RpcClient,
    initialized: Arc<AtomicBool>,
}

impl McpBridge {
    /// Create a new MCP bridge
    pub fn new(client: RpcClient) -> Self {
        Self {
            client,
            initialized: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether the client has completed the initialize handshake
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Run the MCP bridge, reading from stdin and writing to stdout
    pub async fn run(&self) -> Result<(), McpError> {
        let reader = BufReader::new(tokio::io::stdin());
        self.serve(reader, tokio::io::stdout()).await?;
        Ok(())
    }

    /// Serve newline-delimited JSON-RPC until the reader hits EOF
    ///
    /// Returns the writer once every in-flight tool call has answered.
    pub async fn serve<R, W>(&self, reader: R, writer: W) -> Result<W, McpError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(write_responses(writer, out_rx));
        let mut lines = reader.lines();

        info!("MCP bridge starting");

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let log_req_id = REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed);
            debug!(req_id = log_req_id, raw = %line, "Received raw JSON-RPC request");

            let request: JsonRpcRequest = match serde_json::from_str(line) {
                Ok(req) => req,
                Err(e) => {
                    error!(
                        req_id = log_req_id,
                        error = %e,
                        raw_input = %line,
                        "Failed to parse JSON-RPC request"
                    );
                    let _ = out_tx.send(JsonRpcResponse::error(
                        serde_json::Value::Null,
                        JsonRpcError::new(JsonRpcError::PARSE_ERROR, e.to_string()),
                    ));
                    continue;
                }
            };

            info!(
                req_id = log_req_id,
                method = %request.method,
                jsonrpc_id = ?request.id,
                "Incoming JSON-RPC request"
            );

            if request.jsonrpc != "2.0" {
                error!(
                    req_id = log_req_id,
                    method = %request.method,
                    got_version = %request.jsonrpc,
                    "Invalid JSON-RPC version"
                );
                let _ = out_tx.send(JsonRpcResponse::error(
                    request.id,
                    JsonRpcError::with_data(
                        JsonRpcError::INVALID_REQUEST,
                        "Invalid JSON-RPC version",
                        serde_json::json!({"expected": "2.0", "got": request.jsonrpc}),
                    ),
                ));
                continue;
            }

            if request.method == "tools/call" {
                // Backend calls can take seconds; answer them out of order
                let bridge = self.clone();
                let out_tx = out_tx.clone();
                tokio::spawn(async move {
                    if let Some(response) = bridge.handle_request(log_req_id, request).await {
                        let _ = out_tx.send(response);
                    }
                });
            } else if let Some(response) = self.handle_request(log_req_id, request).await {
                let _ = out_tx.send(response);
            }
        }

        info!("MCP bridge input closed");
        drop(out_tx);

        writer_task
            .await
            .map_err(|e| McpError::Internal(format!("response writer failed: {}", e)))?
    }

    /// Handle a JSON-RPC request
    async fn handle_request(
        &self,
        log_req_id: u64,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        let start = std::time::Instant::now();
        let result = match request.method.as_str() {
            "initialize" => self.handle_initialize(),
            "initialized" | "notifications/initialized" => Ok(serde_json::json!({})),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => self.handle_tools_list(),
            "tools/call" => self.handle_tools_call(&request.params).await,
            _ => Err(McpError::MethodNotFound(request.method.clone())),
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if request.is_notification() {
            match result {
                Ok(_) => info!(
                    req_id = log_req_id,
                    method = %request.method,
                    "Notification handled (no response)"
                ),
                Err(e) => warn!(
                    req_id = log_req_id,
                    method = %request.method,
                    error = %e,
                    "Notification handling failed"
                ),
            }
            return None;
        }

        let response = match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => JsonRpcResponse::error(request.id, e.into()),
        };

        if response.is_error() {
            warn!(
                req_id = log_req_id,
                method = %request.method,
                elapsed_ms,
                error = ?response.error,
                "JSON-RPC request completed with error"
            );
        } else {
            info!(
                req_id = log_req_id,
                method = %request.method,
                elapsed_ms,
                "JSON-RPC request completed successfully"
            );
        }

        Some(response)
    }

    fn handle_initialize(&self) -> Result<serde_json::Value, McpError> {
        self.initialized.store(true, Ordering::SeqCst);
        info!("MCP bridge initialized");

        let result = InitializeResult::default();
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    fn handle_tools_list(&self) -> Result<serde_json::Value, McpError> {
        let tools = get_tool_definitions();
        let result = ToolsListResult { tools };
        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    async fn handle_tools_call(
        &self,
        params: &serde_json::Value,
    ) -> Result<serde_json::Value, McpError> {
        let name = params["name"]
            .as_str()
            .ok_or_else(|| McpError::InvalidParams("Missing 'name' parameter".into()))?;

        let arguments = &params["arguments"];

        info!(tool = %name, "Dispatching tool call");
        debug!(tool = %name, arguments = %arguments, "Tool call arguments");

        let result = match self.dispatch_tool(name, arguments).await {
            Ok(result) => {
                info!(tool = %name, is_error = result.is_error.unwrap_or(false), "Tool call completed");
                result
            }
            Err(McpError::Rpc(e)) => {
                if e.is_connection_error() {
                    warn!(tool = %name, error = %e, "Backend unavailable for tool call");
                } else {
                    warn!(tool = %name, error = %e, "Backend call failed");
                }
                ToolResult::error(e.to_string())
            }
            Err(e) => {
                error!(tool = %name, error = %e, arguments = %arguments, "Tool call failed");
                return Err(e);
            }
        };

        serde_json::to_value(result).map_err(|e| McpError::Internal(e.to_string()))
    }

    /// Validate arguments and dispatch to the tool handler
    async fn dispatch_tool(
        &self,
        name: &str,
        arguments: &serde_json::Value,
    ) -> Result<ToolResult, McpError> {
        let args = arguments_object(arguments)?;
        let handlers = ToolHandlers::new(&self.client);

        match name {
            "emulator_reset" => handlers.tool_reset().await,
            "emulator_load_rom" => {
                let path = optional_string(&args, "path")?;
                let bytes_b64 = optional_string(&args, "bytes_b64")?;
                let autorun = optional_bool(&args, "autorun")?;
                handlers.tool_load_rom(path, bytes_b64, autorun).await
            }
            "emulator_run" => {
                let ms = optional_positive_number(&args, "ms")?;
                let cycles = optional_integer(&args, "cycles", 1, i64::MAX)?;
                handlers.tool_run(ms, cycles).await
            }
            "emulator_step" => {
                let count = optional_integer(&args, "count", 1, i64::MAX)?;
                handlers.tool_step(count).await
            }
            "emulator_get_state" => handlers.tool_get_state().await,
            "emulator_save_state" => handlers.tool_save_state().await,
            "emulator_load_state" => {
                let state = args.get("state").filter(|v| !v.is_null()).cloned();
                handlers.tool_load_state(state).await
            }
            "emulator_read_mem" => {
                let addr = parse_addr(&args)?;
                let length = required_integer(&args, "length", 1, 0x10000)?;
                handlers.tool_read_mem(addr, length).await
            }
            "emulator_write_mem" => {
                let addr = parse_addr(&args)?;
                let bytes_b64 = required_string(&args, "bytes_b64")?;
                handlers.tool_write_mem(addr, bytes_b64).await
            }
            "emulator_read_io" => {
                let addr = parse_addr(&args)?;
                handlers.tool_read_io(addr).await
            }
            "emulator_write_io" => {
                let addr = parse_addr(&args)?;
                let value = required_integer(&args, "value", 0, 0xFF)?;
                handlers.tool_write_io(addr, value).await
            }
            "emulator_set_breakpoint" => {
                let addr = parse_addr(&args)?;
                handlers.tool_set_breakpoint(addr).await
            }
            "emulator_clear_breakpoint" => {
                let addr = parse_addr(&args)?;
                handlers.tool_clear_breakpoint(addr).await
            }
            "emulator_get_trace" => {
                let last_n = optional_integer(&args, "last_n", 1, i64::MAX)?;
                handlers.tool_get_trace(last_n).await
            }
            "emulator_screenshot" => handlers.tool_screenshot().await,
            "emulator_send_key" => {
                let event = KeyEvent::from_args(&args)?;
                handlers.tool_send_key(event).await
            }
            "emulator_set_joystick" => {
                let port = required_integer(&args, "port", 0, 3)?;
                let mask = required_integer(&args, "mask", 0, 0xFF)?;
                handlers.tool_set_joystick(port, mask).await
            }
            _ => Err(McpError::UnknownTool(name.into())),
        }
    }
}

/// Serialize responses to the output stream, one JSON object per line
async fn write_responses<W>(
    mut writer: W,
    mut responses: mpsc::UnboundedReceiver<JsonRpcResponse>,
) -> Result<W, McpError>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = responses.recv().await {
        let mut json = serde_json::to_string(&response)?;
        debug!(raw = %json, "Sending raw JSON-RPC response");
        json.push('\n');
        writer.write_all(json.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(writer)
}
