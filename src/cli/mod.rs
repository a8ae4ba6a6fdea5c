//! CLI module for the MCP docs gateway
//!
//! Provides subcommands for running the gateway and managing API keys:
//! - `serve`: run the HTTP gateway
//! - `keys`: issue and revoke API keys against the configured store

pub mod keys;
pub mod serve;

use clap::{Parser, Subcommand};

/// MCP Docs Gateway - API key auth, rate limiting and circuit breaking
#[derive(Parser)]
#[command(name = "mcp-docs-gateway")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the gateway server
    Serve,

    /// Manage API keys
    Keys(keys::KeysArgs),
}
