//! XML-RPC fixture server.
//!
//! Binds `127.0.0.1:8000`, prints the base URL on stdout and serves
//! `add`, `subtract`, `index`, `upper` and `title` plus the `system.*`
//! introspection methods until interrupted.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use xmlrpc_core::{EndpointConfig, MethodRegistry};
use xmlrpc_server::server;

#[derive(Parser, Debug)]
#[command(name = "xmlrpc-server")]
#[command(about = "XML-RPC fixture server on http://localhost:8000/")]
struct Args {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries only the base URL
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    info!("Starting XML-RPC fixture server");

    let registry = MethodRegistry::fixture();
    let addr =
        server::start_server(registry, EndpointConfig::BIND_ADDR, EndpointConfig::PORT).await?;

    // Clients read the endpoint from this line
    println!("{}", EndpointConfig::base_url(addr.port()));

    info!("XML-RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
