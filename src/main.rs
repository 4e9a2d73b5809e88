#![deny(warnings)]
#![deny(clippy::unwrap_used)]

use dotenv::dotenv;
use poem::{EndpointExt, Route, Server, listener::TcpListener, middleware::Tracing};
use poem_mcpserver::{McpServer, streamable_http};
use tracing::{error, info};
use vps_manager::config::resolve_mcp_port;
use vps_manager::mcp::VpsCommands;
use vps_manager::runtime::build_commands;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("info".parse().expect("valid directive")),
        )
        .init();

    // A missing or invalid vault key stops startup before anything is served
    let (commands, sessions) = match build_commands().await {
        Ok(built) => built,
        Err(e) => {
            error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };

    let mcp_addr = format!("0.0.0.0:{}", resolve_mcp_port(None));
    info!("Starting MCP server on {}", mcp_addr);

    let app = Route::new()
        .at(
            "/",
            streamable_http::endpoint(move |_| {
                McpServer::new().tools(VpsCommands::clone(&commands))
            }),
        )
        .with(Tracing);

    Server::new(TcpListener::bind(mcp_addr))
        .name("VPS Manager MCP Server")
        .run_with_graceful_shutdown(
            app,
            async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown requested");
            },
            None,
        )
        .await?;

    sessions.close_all().await;
    info!("All sessions closed");

    Ok(())
}
