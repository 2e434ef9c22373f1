//! clonekv - A Minimal In-Memory Key-Value Store
//!
//! This is the main entry point for the clonekv server.
//! It sets up the TCP listener and storage engine, and handles incoming connections.

use clonekv::commands::CommandHandler;
use clonekv::config::{CliAction, Config};
use clonekv::connection::{handle_connection, ConnectionStats};
use clonekv::storage::MemoryStorage;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn print_help() {
    println!(
        r#"
clonekv - A Minimal In-Memory Key-Value Store

USAGE:
    clonekv [OPTIONS]

OPTIONS:
    -h, --host <HOST>    Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>    Port to listen on (default: 6379)
    -v, --version        Print version information
        --help           Print this help message

ENVIRONMENT:
    RUST_LOG             Log filter (default: info)

CONNECTING:
    Use redis-cli, or plain telnet for inline commands:
    $ redis-cli -p 6379
    127.0.0.1:6379> SET name GoClone EX 10
    OK
    127.0.0.1:6379> GET name
    "GoClone"
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            print_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("clonekv version {}", clonekv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // One key space, shared by every connection
    let storage = Arc::new(MemoryStorage::new());
    let handler = CommandHandler::new(storage);
    info!("Storage engine initialized");

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(version = clonekv::VERSION, "Listening on {}", config.bind_address());

    let shutdown = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        info!("Shutdown signal received, stopping server...");
    };

    tokio::select! {
        _ = accept_loop(listener, handler, stats) => {}
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Main loop that accepts incoming connections
async fn accept_loop(listener: TcpListener, handler: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
