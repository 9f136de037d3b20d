//! CLI for TopicBus
//!
//! Loads the configuration, applies command-line overrides and runs the broker
//! until Ctrl-C.

use std::process::ExitCode;

use clap::Parser;
use topicbus::config::{self, Settings};
use topicbus::transport::Server;
use topicbus::utils::error::ServerError;
use topicbus::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "topicbus", version, about = "In-memory pub/sub broker")]
struct Cli {
    /// Configuration file, without extension (default: config/default)
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: String,

    /// Address to bind, overrides `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides `server.port`
    #[arg(long)]
    port: Option<u16>,

    /// Log level, overrides `log.level` (RUST_LOG still wins)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn apply(self, mut settings: Settings) -> Settings {
        if let Some(host) = self.host {
            settings.server.host = host;
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(level) = self.log_level {
            settings.log.level = level;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run_server(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be set up yet if configuration failed.
            logging::init("info");
            error!("Broker failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_server(cli: Cli) -> Result<(), ServerError> {
    let loaded = config::load_config_from(&cli.config)?;
    let settings = cli.apply(loaded);
    logging::init(&settings.log.level);

    let server = Server::bind(&settings).await?;
    server.run_until_ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully.");
    Ok(())
}
