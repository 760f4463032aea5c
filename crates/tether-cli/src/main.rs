//! Tether CLI — connect to a tool server, inspect it, call a tool.

use anyhow::{Context, Result};
use clap::Parser;
use std::io;
use std::path::PathBuf;
use tether_client::{Config, ToolClient};
use tether_types::ContentItem;

#[derive(Parser)]
#[command(name = "tether", version, about = "Client for a remote tool-execution server")]
struct Cli {
    /// Endpoint URL (overrides TETHER_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Path to a TOML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Call the named tool after connecting
    #[arg(long)]
    call: Option<String>,

    /// Query string passed to the called tool
    #[arg(long, requires = "call")]
    query: Option<String>,

    /// Print the full connection state instead of the health summary
    #[arg(long)]
    state: bool,

    /// Enable verbose/debug logging
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref(), cli.endpoint)
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let client = ToolClient::new(config).context("Failed to create tool client")?;
    client
        .initialize()
        .await
        .context("Failed to connect to the tool server")?;

    if let Some(tool) = cli.call {
        let arguments = match cli.query {
            Some(query) => serde_json::json!({ "query": query }),
            None => serde_json::json!({}),
        };
        let result = client
            .call_tool(&tool, arguments)
            .await
            .with_context(|| format!("Tool call '{tool}' failed"))?;

        for item in result.content {
            match item {
                ContentItem::Text { text } => println!("{text}"),
                ContentItem::Resource { uri, .. } => println!("[resource] {uri}"),
            }
        }
        if result.is_error {
            anyhow::bail!("tool '{tool}' reported an error result");
        }
    } else if cli.state {
        println!("{}", serde_json::to_string_pretty(&client.connection_state())?);
    } else {
        println!("{}", serde_json::to_string_pretty(&client.health())?);
    }

    client.shutdown().await;
    Ok(())
}
