use clap::Parser;
use mcp_docs_gateway::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => cli::serve::run().await,
        Command::Keys(args) => cli::keys::run(args).await,
    }
}
