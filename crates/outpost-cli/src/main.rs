mod passes;
mod scheduler;
mod status;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "outpost")]
#[command(about = "Rate-limited posting daemon and engagement reconciliation poller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one posting pass.
    Daemon {
        /// Discover and draft, but publish and record nothing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one engagement reconciliation pass.
    Poll {
        /// Fetch and compute, but write nothing back.
        #[arg(long)]
        dry_run: bool,
    },
    /// Fire both drivers on their cron schedules until interrupted.
    Schedule,
    /// Print the persisted state of both drivers.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(outpost_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Daemon { dry_run } => passes::daemon_pass(&config, dry_run).await,
        Commands::Poll { dry_run } => passes::poller_pass(&config, dry_run).await,
        Commands::Schedule => scheduler::run(config).await,
        Commands::Status => status::print(&config),
    }
}
