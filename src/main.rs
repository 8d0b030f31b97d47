use clap::Parser;
use dockyard::cli::{commands, Cli};
use dockyard::config::DockyardConfig;
use std::process;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout carries build output and the endpoint
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Starting dockyard v{}", env!("CARGO_PKG_VERSION"));

    let mut config = match DockyardConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    if let Some(url) = cli.scheduler_url {
        config.scheduler.url = url;
    }

    let result = match cli.command {
        Some(command) => commands::handle_command(command, config).await,
        None => {
            eprintln!("No command specified. Use --help for usage information.");
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }

    // a pending stdin read would otherwise keep the runtime from shutting down
    process::exit(0);
}
