pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dockyard")]
#[command(author = "Ignoramuss")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build an app artifact and deploy it as a service on the fleet", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Path to a YAML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, help = "Override the scheduler URL")]
    pub scheduler_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Build an app and (re)deploy its web service; stdin is fed to the build")]
    Deploy {
        #[arg(help = "Application name")]
        app: String,
    },
    #[command(about = "Display hosts known to the scheduler")]
    Hosts,
    #[command(about = "Show the deployed web service of an app")]
    Status {
        #[arg(help = "Application name")]
        app: String,
    },
}
