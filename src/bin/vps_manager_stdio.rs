#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use poem_mcpserver::McpServer;
use vps_manager::runtime::build_commands;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    let (commands, sessions) = build_commands().await?;
    let served = poem_mcpserver::stdio::stdio(McpServer::new().tools(commands)).await;
    sessions.close_all().await;
    served?;
    Ok(())
}
