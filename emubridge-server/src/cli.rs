//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use emubridge_utils::LogOutput;

use crate::config::AppConfig;

/// MCP server exposing an emulator backend as tools
#[derive(Parser, Debug)]
#[command(name = "emubridge")]
#[command(about = "MCP bridge to an emulator backend over WebSocket")]
#[command(version)]
pub struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/emubridge/config.toml)
    #[arg(long, env = "EMUBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Backend WebSocket URL, e.g. ws://localhost:8765
    #[arg(long)]
    pub url: Option<String>,

    /// Delay before each reconnect attempt
    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,

    /// Deadline for a single backend call
    #[arg(long)]
    pub call_timeout_ms: Option<u64>,

    /// Where log records go: stderr, file or both
    #[arg(long, env = "EMUBRIDGE_LOG_OUTPUT")]
    pub log_output: Option<LogOutput>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Serve MCP over stdio (the default)
    Serve,

    /// Print the effective configuration as TOML and exit
    #[command(name = "print-config")]
    PrintConfig,
}

impl Cli {
    /// Apply flag overrides on top of file and environment values
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(url) = &self.url {
            config.backend.url = url.clone();
        }
        if let Some(delay) = self.reconnect_delay_ms {
            config.backend.reconnect_delay_ms = delay;
        }
        if let Some(timeout) = self.call_timeout_ms {
            config.backend.call_timeout_ms = timeout;
        }
        if let Some(output) = self.log_output {
            config.logging.output = output;
        }
    }

    pub fn command(&self) -> Command {
        self.command.unwrap_or(Command::Serve)
    }
}
