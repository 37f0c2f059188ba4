//! MCP tool definitions for emubridge
//!
//! Defines the emulator tools exposed through the MCP protocol.

use serde_json::{json, Value};

use super::protocol::Tool;

fn address(description: &str) -> Value {
    json!({
        "type": "integer",
        "minimum": 0,
        "maximum": 0xFFFF,
        "description": description
    })
}

fn no_arguments() -> Value {
    json!({
        "type": "object",
        "properties": {}
    })
}

/// Get all tool definitions for the emubridge MCP server
pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: "emulator_reset".into(),
            description: "Reset the emulated machine".into(),
            input_schema: no_arguments(),
        },
        Tool {
            name: "emulator_load_rom".into(),
            description: "Load a ROM image from a path on the backend host or from base64 bytes".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Path to the ROM file, as seen by the emulator"
                    },
                    "bytes_b64": {
                        "type": "string",
                        "minLength": 1,
                        "description": "ROM contents, base64 encoded"
                    },
                    "autorun": {
                        "type": "boolean",
                        "description": "Start running after loading"
                    }
                }
            }),
        },
        Tool {
            name: "emulator_run".into(),
            description: "Run the CPU for a number of milliseconds or cycles".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "ms": {
                        "type": "number",
                        "exclusiveMinimum": 0,
                        "description": "Emulated milliseconds to run (converted at 1.789773 MHz)"
                    },
                    "cycles": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "CPU cycles to run; takes precedence over ms"
                    }
                }
            }),
        },
        Tool {
            name: "emulator_step".into(),
            description: "Single-step the CPU".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Instructions to execute (default: 1)"
                    }
                }
            }),
        },
        Tool {
            name: "emulator_get_state".into(),
            description: "Get CPU registers and machine state".into(),
            input_schema: no_arguments(),
        },
        Tool {
            name: "emulator_save_state".into(),
            description: "Capture the current machine state".into(),
            input_schema: no_arguments(),
        },
        Tool {
            name: "emulator_load_state".into(),
            description: "Restore a previously captured machine state".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "state": {
                        "description": "State object as returned by emulator_save_state"
                    }
                }
            }),
        },
        Tool {
            name: "emulator_read_mem".into(),
            description: "Read a block of memory".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "addr": address("Start address"),
                    "length": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 0x10000,
                        "description": "Number of bytes to read"
                    }
                },
                "required": ["addr", "length"]
            }),
        },
        Tool {
            name: "emulator_write_mem".into(),
            description: "Write base64 encoded bytes into memory".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "addr": address("Start address"),
                    "bytes_b64": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Bytes to write, base64 encoded"
                    }
                },
                "required": ["addr", "bytes_b64"]
            }),
        },
        Tool {
            name: "emulator_read_io".into(),
            description: "Read a hardware I/O register".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "addr": address("Register address")
                },
                "required": ["addr"]
            }),
        },
        Tool {
            name: "emulator_write_io".into(),
            description: "Write a hardware I/O register".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "addr": address("Register address"),
                    "value": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": 0xFF,
                        "description": "Byte value to write"
                    }
                },
                "required": ["addr", "value"]
            }),
        },
        Tool {
            name: "emulator_set_breakpoint".into(),
            description: "Set a breakpoint at an address".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "addr": address("Breakpoint address")
                },
                "required": ["addr"]
            }),
        },
        Tool {
            name: "emulator_clear_breakpoint".into(),
            description: "Clear the breakpoint at an address".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "addr": address("Breakpoint address")
                },
                "required": ["addr"]
            }),
        },
        Tool {
            name: "emulator_get_trace".into(),
            description: "Get the recent instruction trace".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "last_n": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Number of most recent entries to return"
                    }
                }
            }),
        },
        Tool {
            name: "emulator_screenshot".into(),
            description: "Capture the current video frame".into(),
            input_schema: no_arguments(),
        },
        Tool {
            name: "emulator_send_key".into(),
            description: "Send a keyboard event".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "key_code": { "type": "integer", "description": "Key code" },
                    "char_code": { "type": "integer", "description": "Character code" },
                    "down": { "type": "boolean", "description": "Key pressed (true) or released (false)" },
                    "shift": { "type": "boolean" },
                    "ctrl": { "type": "boolean" },
                    "alt": { "type": "boolean" },
                    "meta": { "type": "boolean" },
                    "flags": { "type": "integer", "description": "Raw modifier flags" }
                }
            }),
        },
        Tool {
            name: "emulator_set_joystick".into(),
            description: "Set the joystick state for a port".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "port": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": 3,
                        "description": "Controller port"
                    },
                    "mask": {
                        "type": "integer",
                        "minimum": 0,
                        "maximum": 0xFF,
                        "description": "Direction and button bit mask"
                    }
                },
                "required": ["port", "mask"]
            }),
        },
    ]
}
