use std::io::Cursor;

use serde_json::{json, Value};

use super::handlers::{
    arguments_object, ms_to_cycles, optional_integer, optional_string, respond, KeyEvent,
};
use super::McpBridge;
use crate::mcp::error::McpError;
use crate::mcp::protocol::{JsonRpcError, ToolContent};
use crate::rpc::testing::{open_client, test_backend_config, FakeBackend, FakeConnector};
use crate::rpc::RpcClient;

fn args(value: Value) -> emubridge_protocol::Params {
    value.as_object().cloned().unwrap()
}

fn tool_call(id: u64, name: &str, arguments: Value) -> String {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": {"name": name, "arguments": arguments}
    })
    .to_string()
}

fn parse_output(output: Vec<u8>) -> Vec<Value> {
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

async fn serve_lines(bridge: &McpBridge, lines: &[String]) -> Vec<Value> {
    let input = Cursor::new(lines.join("\n").into_bytes());
    let output = bridge.serve(input, Vec::new()).await.unwrap();
    parse_output(output)
}

/// Bridge over a client that has never connected
fn offline_bridge() -> McpBridge {
    let (connector, _links) = FakeConnector::new();
    McpBridge::new(RpcClient::with_connector(&test_backend_config(), connector))
}

async fn online_bridge() -> (McpBridge, FakeBackend) {
    let (client, _connector, _links, backend) = open_client(&test_backend_config()).await;
    (McpBridge::new(client), backend)
}

/// Run one tool call against a live fake backend and return the request it
/// produced along with the JSON-RPC response
async fn call_tool_with_backend(
    name: &str,
    arguments: Value,
    reply: Value,
) -> (emubridge_protocol::RequestEnvelope, Value) {
    let (bridge, mut backend) = online_bridge().await;
    let line = tool_call(1, name, arguments);
    let serve = tokio::spawn(async move { serve_lines(&bridge, &[line]).await });

    let request = backend.next_request().await;
    backend.reply(request.id.clone(), reply);

    let mut responses = serve.await.unwrap();
    (request, responses.remove(0))
}

fn tool_text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}

// ==================== Argument Helper Tests ====================

#[test]
fn test_arguments_object_null_is_empty() {
    assert!(arguments_object(&Value::Null).unwrap().is_empty());
}

#[test]
fn test_arguments_object_rejects_array() {
    let result = arguments_object(&json!([1, 2]));
    assert!(matches!(result, Err(McpError::InvalidParams(_))));
}

#[test]
fn test_optional_integer_accepts_whole_float() {
    let value = optional_integer(&args(json!({"addr": 3.0})), "addr", 0, 0xFFFF).unwrap();
    assert_eq!(value, Some(3));
}

#[test]
fn test_optional_integer_rejects_fraction() {
    let result = optional_integer(&args(json!({"addr": 1.5})), "addr", 0, 0xFFFF);
    assert!(matches!(result, Err(McpError::InvalidParams(_))));
}

#[test]
fn test_optional_integer_range() {
    let result = optional_integer(&args(json!({"addr": 0x10000})), "addr", 0, 0xFFFF);
    assert!(matches!(result, Err(McpError::InvalidParams(msg)) if msg.contains("addr")));
}

#[test]
fn test_optional_string_rejects_empty() {
    let result = optional_string(&args(json!({"path": ""})), "path");
    assert!(matches!(result, Err(McpError::InvalidParams(_))));
}

#[test]
fn test_ms_to_cycles() {
    assert_eq!(ms_to_cycles(1000.0), 1_789_773);
    assert_eq!(ms_to_cycles(16.0), 28_636);
    assert_eq!(ms_to_cycles(0.0001), 1);
}

#[test]
fn test_respond_string_passes_through() {
    let result = respond(json!("READY")).unwrap();
    let ToolContent::Text { text } = &result.content[0];
    assert_eq!(text, "READY");
}

#[test]
fn test_respond_object_is_pretty_json() {
    let result = respond(json!({"pc": 1})).unwrap();
    let ToolContent::Text { text } = &result.content[0];
    assert_eq!(text, "{\n  \"pc\": 1\n}");
}

#[test]
fn test_key_event_keeps_only_known_fields() {
    let event = KeyEvent::from_args(&args(json!({"key_code": 65, "down": true, "junk": 1}))).unwrap();
    assert_eq!(event.key_code, Some(65));
    assert_eq!(event.down, Some(true));
    assert_eq!(event.shift, None);
}

// ==================== Protocol Tests ====================

#[tokio::test(start_paused = true)]
async fn test_initialize_and_list_tools() {
    let bridge = offline_bridge();
    let responses = serve_lines(
        &bridge,
        &[
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#.into(),
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#.into(),
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#.into(),
        ],
    )
    .await;

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 1);
    assert_eq!(responses[0]["result"]["serverInfo"]["name"], "emubridge");
    assert_eq!(responses[1]["result"]["tools"].as_array().unwrap().len(), 17);
    assert!(bridge.is_initialized());
}

#[tokio::test(start_paused = true)]
async fn test_ping_returns_empty_object() {
    let responses = serve_lines(
        &offline_bridge(),
        &[r#"{"jsonrpc":"2.0","id":"p","method":"ping"}"#.into()],
    )
    .await;

    assert_eq!(responses[0]["id"], "p");
    assert_eq!(responses[0]["result"], json!({}));
}

#[tokio::test(start_paused = true)]
async fn test_parse_error_has_null_id() {
    let responses = serve_lines(&offline_bridge(), &["{not json".into()]).await;

    assert_eq!(responses[0]["id"], Value::Null);
    assert_eq!(responses[0]["error"]["code"], JsonRpcError::PARSE_ERROR);
}

#[tokio::test(start_paused = true)]
async fn test_wrong_jsonrpc_version() {
    let responses = serve_lines(
        &offline_bridge(),
        &[r#"{"jsonrpc":"1.0","id":3,"method":"ping"}"#.into()],
    )
    .await;

    assert_eq!(responses[0]["error"]["code"], JsonRpcError::INVALID_REQUEST);
    assert_eq!(responses[0]["error"]["data"]["got"], "1.0");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_method() {
    let responses = serve_lines(
        &offline_bridge(),
        &[r#"{"jsonrpc":"2.0","id":4,"method":"resources/list"}"#.into()],
    )
    .await;

    assert_eq!(responses[0]["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_blank_lines_ignored() {
    let responses = serve_lines(
        &offline_bridge(),
        &["".into(), "   ".into(), r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#.into()],
    )
    .await;

    assert_eq!(responses.len(), 1);
}

// ==================== Tool Error Tests ====================

#[tokio::test(start_paused = true)]
async fn test_tool_call_while_disconnected_is_tool_error() {
    let responses = serve_lines(
        &offline_bridge(),
        &[tool_call(1, "emulator_get_state", json!({}))],
    )
    .await;

    assert_eq!(responses[0]["result"]["isError"], true);
    assert_eq!(tool_text(&responses[0]), "Emulator bridge is not connected");
}

#[tokio::test(start_paused = true)]
async fn test_unknown_tool() {
    let responses = serve_lines(&offline_bridge(), &[tool_call(1, "emulator_fly", json!({}))]).await;
    assert_eq!(responses[0]["error"]["code"], JsonRpcError::METHOD_NOT_FOUND);
}

#[tokio::test(start_paused = true)]
async fn test_invalid_arguments_are_invalid_params() {
    let bridge = offline_bridge();
    let responses = serve_lines(
        &bridge,
        &[
            tool_call(1, "emulator_read_mem", json!({"addr": 70000, "length": 4})),
            tool_call(2, "emulator_read_mem", json!({"addr": 0, "length": 0})),
            tool_call(3, "emulator_write_io", json!({"addr": 53248, "value": 256})),
            tool_call(4, "emulator_set_joystick", json!({"port": 4, "mask": 0})),
            tool_call(5, "emulator_step", json!({"count": 0})),
            tool_call(6, "emulator_write_mem", json!({"addr": 0})),
            tool_call(7, "emulator_run", json!({"ms": -5})),
        ],
    )
    .await;

    assert_eq!(responses.len(), 7);
    for response in &responses {
        assert_eq!(
            response["error"]["code"],
            JsonRpcError::INVALID_PARAMS,
            "unexpected response {}",
            response
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_missing_tool_name() {
    let responses = serve_lines(
        &offline_bridge(),
        &[r#"{"jsonrpc":"2.0","id":1,"method":"tools/call","params":{}}"#.into()],
    )
    .await;

    assert_eq!(responses[0]["error"]["code"], JsonRpcError::INVALID_PARAMS);
}

#[tokio::test(start_paused = true)]
async fn test_load_rom_requires_a_source() {
    let responses = serve_lines(
        &offline_bridge(),
        &[tool_call(1, "emulator_load_rom", json!({"autorun": true}))],
    )
    .await;

    assert_eq!(responses[0]["result"]["isError"], true);
    assert_eq!(tool_text(&responses[0]), "Provide either path or bytes_b64");
}

#[tokio::test(start_paused = true)]
async fn test_run_requires_ms_or_cycles() {
    let responses = serve_lines(&offline_bridge(), &[tool_call(1, "emulator_run", json!({}))]).await;

    assert_eq!(responses[0]["result"]["isError"], true);
    assert_eq!(tool_text(&responses[0]), "Provide ms or cycles");
}

#[tokio::test(start_paused = true)]
async fn test_remote_error_becomes_tool_error() {
    let (bridge, mut backend) = online_bridge().await;
    let line = tool_call(1, "emulator_read_io", json!({"addr": 53770}));
    let serve = tokio::spawn(async move { serve_lines(&bridge, &[line]).await });

    let request = backend.next_request().await;
    backend.reply_error(request.id, Some("no such register"));

    let responses = serve.await.unwrap();
    assert_eq!(responses[0]["result"]["isError"], true);
    assert_eq!(tool_text(&responses[0]), "no such register");
}

// ==================== Backend Mapping Tests ====================

#[tokio::test(start_paused = true)]
async fn test_reset_reports_text() {
    let (request, response) = call_tool_with_backend("emulator_reset", json!({}), Value::Null).await;

    assert_eq!(request.method, "reset");
    assert!(request.params.is_empty());
    assert_eq!(tool_text(&response), "Emulator reset");
}

#[tokio::test(start_paused = true)]
async fn test_load_rom_renames_and_omits_fields() {
    let (request, _) = call_tool_with_backend(
        "emulator_load_rom",
        json!({"bytes_b64": "AAEC"}),
        json!({"loaded": true}),
    )
    .await;

    assert_eq!(request.method, "loadRom");
    assert_eq!(serde_json::Value::Object(request.params), json!({"bytesB64": "AAEC"}));
}

#[tokio::test(start_paused = true)]
async fn test_run_converts_ms_to_cycles() {
    let (request, response) =
        call_tool_with_backend("emulator_run", json!({"ms": 10}), json!("ok")).await;

    assert_eq!(request.method, "runCycles");
    assert_eq!(request.params["cycles"], 17_898);
    assert_eq!(tool_text(&response), "ok");
}

#[tokio::test(start_paused = true)]
async fn test_run_cycles_take_precedence() {
    let (request, _) =
        call_tool_with_backend("emulator_run", json!({"ms": 10, "cycles": 5}), json!(null)).await;
    assert_eq!(request.params["cycles"], 5);
}

#[tokio::test(start_paused = true)]
async fn test_step_defaults_to_one() {
    let (request, _) = call_tool_with_backend("emulator_step", json!({}), json!(null)).await;

    assert_eq!(request.method, "step");
    assert_eq!(request.params["count"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_save_state_reads_state() {
    let (request, response) =
        call_tool_with_backend("emulator_save_state", json!({}), json!({"a": 1})).await;

    assert_eq!(request.method, "getState");
    assert_eq!(tool_text(&response), "{\n  \"a\": 1\n}");
}

#[tokio::test(start_paused = true)]
async fn test_load_state_forwards_state() {
    let (request, _) = call_tool_with_backend(
        "emulator_load_state",
        json!({"state": {"pc": 1536}}),
        json!(true),
    )
    .await;

    assert_eq!(request.method, "loadState");
    assert_eq!(request.params["state"], json!({"pc": 1536}));
}

#[tokio::test(start_paused = true)]
async fn test_read_mem_params() {
    let (request, _) = call_tool_with_backend(
        "emulator_read_mem",
        json!({"addr": 0x0600, "length": 16}),
        json!("AAAA"),
    )
    .await;

    assert_eq!(request.method, "readMem");
    assert_eq!(Value::Object(request.params), json!({"addr": 1536, "length": 16}));
}

#[tokio::test(start_paused = true)]
async fn test_write_mem_renames_bytes() {
    let (request, _) = call_tool_with_backend(
        "emulator_write_mem",
        json!({"addr": 0, "bytes_b64": "qg=="}),
        json!(null),
    )
    .await;

    assert_eq!(request.method, "writeMem");
    assert_eq!(Value::Object(request.params), json!({"addr": 0, "bytesB64": "qg=="}));
}

#[tokio::test(start_paused = true)]
async fn test_io_and_breakpoint_methods() {
    for (tool, arguments, method) in [
        ("emulator_read_io", json!({"addr": 53770}), "readIO"),
        ("emulator_write_io", json!({"addr": 53770, "value": 255}), "writeIO"),
        ("emulator_set_breakpoint", json!({"addr": 1536}), "setBreakpoint"),
        ("emulator_clear_breakpoint", json!({"addr": 1536}), "clearBreakpoint"),
        ("emulator_set_joystick", json!({"port": 3, "mask": 15}), "setJoystick"),
    ] {
        let (request, _) = call_tool_with_backend(tool, arguments.clone(), json!(null)).await;
        assert_eq!(request.method, method);
        assert_eq!(Value::Object(request.params), arguments);
    }
}

#[tokio::test(start_paused = true)]
async fn test_get_trace_renames_last_n() {
    let (request, _) =
        call_tool_with_backend("emulator_get_trace", json!({"last_n": 20}), json!([])).await;
    assert_eq!(Value::Object(request.params), json!({"lastN": 20}));

    let (request, _) = call_tool_with_backend("emulator_get_trace", json!({}), json!([])).await;
    assert!(request.params.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_send_key_forwards_provided_fields() {
    let (request, _) = call_tool_with_backend(
        "emulator_send_key",
        json!({"key_code": 33, "down": true, "shift": false}),
        json!(null),
    )
    .await;

    assert_eq!(request.method, "sendKey");
    assert_eq!(
        Value::Object(request.params),
        json!({"key_code": 33, "down": true, "shift": false})
    );
}

#[tokio::test(start_paused = true)]
async fn test_screenshot_string_passes_through() {
    let (request, response) =
        call_tool_with_backend("emulator_screenshot", json!({}), json!("iVBORw0KGgo=")).await;

    assert_eq!(request.method, "screenshot");
    assert_eq!(tool_text(&response), "iVBORw0KGgo=");
}

// ==================== Concurrency Tests ====================

#[tokio::test(start_paused = true)]
async fn test_tool_calls_answer_out_of_order() {
    let (bridge, mut backend) = online_bridge().await;
    let lines = vec![
        tool_call(1, "emulator_get_state", json!({})),
        tool_call(2, "emulator_screenshot", json!({})),
    ];
    let serve = tokio::spawn(async move { serve_lines(&bridge, &lines).await });

    let first = backend.next_request().await;
    let second = backend.next_request().await;
    let (state, shot) = if first.method == "getState" {
        (first, second)
    } else {
        (second, first)
    };

    backend.reply(shot.id, json!("frame"));
    // The slow call is still pending while the fast one has been answered
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    backend.reply(state.id, json!({"pc": 0}));

    let responses = serve.await.unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["id"], 2);
    assert_eq!(responses[1]["id"], 1);
}
