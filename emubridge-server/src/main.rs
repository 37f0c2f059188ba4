//! emubridge - MCP server bridging tool calls to an emulator backend
//!
//! Reads MCP JSON-RPC on stdin, forwards tool calls over a persistent
//! WebSocket to the backend, and writes responses to stdout.

mod cli;
mod config;
mod mcp;
mod rpc;

use clap::Parser;
use emubridge_utils::{init_logging_with_config, BridgeError, Result};
use tracing::{error, info};

use crate::cli::{Cli, Command};
use crate::config::{AppConfig, ConfigLoader};
use crate::mcp::McpBridge;
use crate::rpc::RpcClient;

/// Resolve configuration: file, then environment, then flags
fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = ConfigLoader::load(cli.config.as_deref())?;
    ConfigLoader::apply_env(&mut config);
    cli.apply_overrides(&mut config);
    ConfigLoader::validate(&config)?;
    Ok(config)
}

async fn run_bridge(config: AppConfig) -> Result<()> {
    info!(url = %config.backend.url, "emubridge starting");

    let client = RpcClient::new(&config.backend);
    client.connect();

    let bridge = McpBridge::new(client.clone());
    let result = bridge.run().await;

    client.shutdown();

    result.map_err(|e| {
        error!(error = %e, "MCP bridge stopped with an error");
        BridgeError::frontend(e.to_string())
    })?;

    info!("emubridge exiting");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command() {
        Command::PrintConfig => {
            let rendered = toml::to_string_pretty(&config)
                .map_err(|e| BridgeError::internal(format!("failed to render config: {}", e)))?;
            print!("{}", rendered);
            Ok(())
        }
        Command::Serve => {
            // Stdout carries the MCP stream, so logs never go there
            init_logging_with_config(config.logging.to_log_config())?;
            run_bridge(config).await
        }
    }
}
