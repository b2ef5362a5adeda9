//! CLI for Huddle
//!
//! Subcommands:
//! - `server`: run the WebSocket server

use clap::Parser;
use huddle::Broker;
use huddle::config::{load_config, load_config_from};
use huddle::transport::websocket::start_websocket_server;
use huddle::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "huddle")]
enum Command {
    /// Start the WebSocket server
    Server {
        /// Configuration file to load instead of config/default
        #[arg(long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cmd = Command::parse();

    match cmd {
        Command::Server { config } => {
            if let Err(e) = run_server(config.as_deref()).await {
                logging::init("info");
                error!("Server failed: {}", e);
            }
        }
    }
}

async fn run_server(config_path: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    logging::init(&config.logging.level);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let broker = Broker::from_settings(&config)?;

    tokio::select! {
        served = start_websocket_server(&addr, broker.clone()) => {
            if let Err(e) = served {
                error!("WebSocket server failed: {e}");
            } else {
                error!("WebSocket server exited unexpectedly.");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    broker.shutdown();
    Ok(())
}
