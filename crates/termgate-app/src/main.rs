use anyhow::Result;
use clap::Parser;

use termgate::{logging, Cli, GatewayConfig, WebServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = GatewayConfig::from_cli(&cli)?;
    config.prepare()?;

    WebServer::new(config).start().await
}
