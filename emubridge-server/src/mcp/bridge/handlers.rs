//! Tool handlers: argument validation and backend calls

use emubridge_protocol::Params;
use serde_json::Value;

use crate::mcp::error::McpError;
use crate::mcp::protocol::ToolResult;
use crate::rpc::RpcClient;

/// NTSC 6502 clock, used to turn emulated milliseconds into cycles
pub const CPU_HZ: f64 = 1_789_773.0;

/// Highest address on the 16-bit bus
pub const MAX_ADDR: i64 = 0xFFFF;

/// Arguments object of a tools/call; missing arguments count as empty
pub fn arguments_object(arguments: &Value) -> Result<Params, McpError> {
    match arguments {
        Value::Null => Ok(Params::new()),
        Value::Object(map) => Ok(map.clone()),
        _ => Err(McpError::InvalidParams("'arguments' must be an object".into())),
    }
}

fn present<'v>(args: &'v Params, field: &str) -> Option<&'v Value> {
    args.get(field).filter(|v| !v.is_null())
}

/// Integer argument, accepting whole-valued floats such as `3.0`
pub fn optional_integer(
    args: &Params,
    field: &str,
    min: i64,
    max: i64,
) -> Result<Option<i64>, McpError> {
    let Some(value) = present(args, field) else {
        return Ok(None);
    };

    let n = value
        .as_i64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        })
        .ok_or_else(|| McpError::InvalidParams(format!("'{}' must be an integer", field)))?;

    if n < min || n > max {
        return Err(McpError::InvalidParams(format!(
            "'{}' must be between {} and {}, got {}",
            field, min, max, n
        )));
    }
    Ok(Some(n))
}

pub fn required_integer(args: &Params, field: &str, min: i64, max: i64) -> Result<i64, McpError> {
    optional_integer(args, field, min, max)?
        .ok_or_else(|| McpError::InvalidParams(format!("Missing '{}' parameter", field)))
}

/// Address argument on the 16-bit bus
pub fn parse_addr(args: &Params) -> Result<i64, McpError> {
    required_integer(args, "addr", 0, MAX_ADDR)
}

pub fn optional_string(args: &Params, field: &str) -> Result<Option<String>, McpError> {
    match present(args, field) {
        None => Ok(None),
        Some(Value::String(s)) if !s.is_empty() => Ok(Some(s.clone())),
        Some(_) => Err(McpError::InvalidParams(format!(
            "'{}' must be a non-empty string",
            field
        ))),
    }
}

pub fn required_string(args: &Params, field: &str) -> Result<String, McpError> {
    optional_string(args, field)?
        .ok_or_else(|| McpError::InvalidParams(format!("Missing '{}' parameter", field)))
}

pub fn optional_bool(args: &Params, field: &str) -> Result<Option<bool>, McpError> {
    match present(args, field) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(McpError::InvalidParams(format!("'{}' must be a boolean", field))),
    }
}

pub fn optional_positive_number(args: &Params, field: &str) -> Result<Option<f64>, McpError> {
    match present(args, field) {
        None => Ok(None),
        Some(value) => match value.as_f64() {
            Some(n) if n > 0.0 && n.is_finite() => Ok(Some(n)),
            _ => Err(McpError::InvalidParams(format!(
                "'{}' must be a positive number",
                field
            ))),
        },
    }
}

/// Cycles to run for a duration in emulated milliseconds, never less than one
pub fn ms_to_cycles(ms: f64) -> i64 {
    ((ms * CPU_HZ / 1000.0).round() as i64).max(1)
}

/// Render a backend result as tool text
///
/// Strings pass through unchanged, anything else is pretty-printed JSON.
pub fn respond(payload: Value) -> Result<ToolResult, McpError> {
    match payload {
        Value::String(text) => Ok(ToolResult::text(text)),
        other => Ok(ToolResult::text(serde_json::to_string_pretty(&other)?)),
    }
}

fn params_of<const N: usize>(entries: [(&str, Option<Value>); N]) -> Params {
    entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key.to_string(), v)))
        .collect()
}

/// Keyboard event fields forwarded to the backend as given
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeyEvent {
    pub key_code: Option<i64>,
    pub char_code: Option<i64>,
    pub down: Option<bool>,
    pub shift: Option<bool>,
    pub ctrl: Option<bool>,
    pub alt: Option<bool>,
    pub meta: Option<bool>,
    pub flags: Option<i64>,
}

impl KeyEvent {
    pub fn from_args(args: &Params) -> Result<Self, McpError> {
        Ok(Self {
            key_code: optional_integer(args, "key_code", i64::MIN, i64::MAX)?,
            char_code: optional_integer(args, "char_code", i64::MIN, i64::MAX)?,
            down: optional_bool(args, "down")?,
            shift: optional_bool(args, "shift")?,
            ctrl: optional_bool(args, "ctrl")?,
            alt: optional_bool(args, "alt")?,
            meta: optional_bool(args, "meta")?,
            flags: optional_integer(args, "flags", i64::MIN, i64::MAX)?,
        })
    }

    fn into_params(self) -> Params {
        params_of([
            ("key_code", self.key_code.map(Value::from)),
            ("char_code", self.char_code.map(Value::from)),
            ("down", self.down.map(Value::from)),
            ("shift", self.shift.map(Value::from)),
            ("ctrl", self.ctrl.map(Value::from)),
            ("alt", self.alt.map(Value::from)),
            ("meta", self.meta.map(Value::from)),
            ("flags", self.flags.map(Value::from)),
        ])
    }
}

pub struct ToolHandlers<'a> {
    client: &'a RpcClient,
}

impl<'a> ToolHandlers<'a> {
    pub fn new(client: &'a RpcClient) -> Self {
        Self { client }
    }

    async fn call(&self, method: &str, params: Option<Params>) -> Result<Value, McpError> {
        Ok(self.client.call(method, params).await?)
    }

    pub async fn tool_reset(&self) -> Result<ToolResult, McpError> {
        self.call("reset", None).await?;
        respond(Value::from("Emulator reset"))
    }

    pub async fn tool_load_rom(
        &self,
        path: Option<String>,
        bytes_b64: Option<String>,
        autorun: Option<bool>,
    ) -> Result<ToolResult, McpError> {
        if path.is_none() && bytes_b64.is_none() {
            return Ok(ToolResult::error("Provide either path or bytes_b64"));
        }
        let params = params_of([
            ("path", path.map(Value::from)),
            ("bytesB64", bytes_b64.map(Value::from)),
            ("autorun", autorun.map(Value::from)),
        ]);
        respond(self.call("loadRom", Some(params)).await?)
    }

    pub async fn tool_run(
        &self,
        ms: Option<f64>,
        cycles: Option<i64>,
    ) -> Result<ToolResult, McpError> {
        let cycles = match (cycles, ms) {
            (Some(cycles), _) => cycles,
            (None, Some(ms)) => ms_to_cycles(ms),
            (None, None) => return Ok(ToolResult::error("Provide ms or cycles")),
        };
        let params = params_of([("cycles", Some(Value::from(cycles)))]);
        respond(self.call("runCycles", Some(params)).await?)
    }

    pub async fn tool_step(&self, count: Option<i64>) -> Result<ToolResult, McpError> {
        let params = params_of([("count", Some(Value::from(count.unwrap_or(1))))]);
        respond(self.call("step", Some(params)).await?)
    }

    pub async fn tool_get_state(&self) -> Result<ToolResult, McpError> {
        respond(self.call("getState", None).await?)
    }

    /// The backend has no separate snapshot call; a state dump is the snapshot
    pub async fn tool_save_state(&self) -> Result<ToolResult, McpError> {
        respond(self.call("getState", None).await?)
    }

    pub async fn tool_load_state(&self, state: Option<Value>) -> Result<ToolResult, McpError> {
        let params = params_of([("state", state)]);
        respond(self.call("loadState", Some(params)).await?)
    }

    pub async fn tool_read_mem(&self, addr: i64, length: i64) -> Result<ToolResult, McpError> {
        let params = params_of([
            ("addr", Some(Value::from(addr))),
            ("length", Some(Value::from(length))),
        ]);
        respond(self.call("readMem", Some(params)).await?)
    }

    pub async fn tool_write_mem(&self, addr: i64, bytes_b64: String) -> Result<ToolResult, McpError> {
        let params = params_of([
            ("addr", Some(Value::from(addr))),
            ("bytesB64", Some(Value::from(bytes_b64))),
        ]);
        respond(self.call("writeMem", Some(params)).await?)
    }

    pub async fn tool_read_io(&self, addr: i64) -> Result<ToolResult, McpError> {
        let params = params_of([("addr", Some(Value::from(addr)))]);
        respond(self.call("readIO", Some(params)).await?)
    }

    pub async fn tool_write_io(&self, addr: i64, value: i64) -> Result<ToolResult, McpError> {
        let params = params_of([
            ("addr", Some(Value::from(addr))),
            ("value", Some(Value::from(value))),
        ]);
        respond(self.call("writeIO", Some(params)).await?)
    }

    pub async fn tool_set_breakpoint(&self, addr: i64) -> Result<ToolResult, McpError> {
        let params = params_of([("addr", Some(Value::from(addr)))]);
        respond(self.call("setBreakpoint", Some(params)).await?)
    }

    pub async fn tool_clear_breakpoint(&self, addr: i64) -> Result<ToolResult, McpError> {
        let params = params_of([("addr", Some(Value::from(addr)))]);
        respond(self.call("clearBreakpoint", Some(params)).await?)
    }

    pub async fn tool_get_trace(&self, last_n: Option<i64>) -> Result<ToolResult, McpError> {
        let params = params_of([("lastN", last_n.map(Value::from))]);
        respond(self.call("getTrace", Some(params)).await?)
    }

    pub async fn tool_screenshot(&self) -> Result<ToolResult, McpError> {
        respond(self.call("screenshot", None).await?)
    }

    pub async fn tool_send_key(&self, event: KeyEvent) -> Result<ToolResult, McpError> {
        respond(self.call("sendKey", Some(event.into_params())).await?)
    }

    pub async fn tool_set_joystick(&self, port: i64, mask: i64) -> Result<ToolResult, McpError> {
        let params = params_of([
            ("port", Some(Value::from(port))),
            ("mask", Some(Value::from(mask))),
        ]);
        respond(self.call("setJoystick", Some(params)).await?)
    }
}
