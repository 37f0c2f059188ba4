//! MCP (Model Context Protocol) frontend
//!
//! Exposes the emulator backend as a set of MCP tools over stdio.

pub mod bridge;
pub mod error;
pub mod protocol;
pub mod tools;

pub use bridge::McpBridge;
