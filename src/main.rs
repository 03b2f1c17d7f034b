mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hooter::config::HooterConfig;

#[derive(Parser)]
#[command(name = "hooter", version, about = "Daily study-streak tracker for voice-channel communities")]
struct Cli {
    /// Config file (defaults to ~/.hooter/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Track streaks from a JSON-lines presence feed on stdin
    Serve {
        /// JSON array of known members to reconcile before reading events
        #[arg(long)]
        roster: Option<PathBuf>,
    },
    /// Show one user's streak
    Show {
        /// Platform user id
        user_id: String,
    },
    /// Print the daily streak summary now
    Summary,
    /// Check the streaks file for corruption and stuck sessions
    Doctor,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => HooterConfig::load_from(path)?,
        None => HooterConfig::load()?,
    };

    // Log to stderr so stdout stays clean for the notification stream.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let grace = config.io_timeout();
    hooter::server::block_on(grace, run(cli.command, config))?
}

async fn run(command: Command, config: HooterConfig) -> Result<()> {
    match command {
        Command::Serve { roster } => {
            hooter::server::serve_stdio(config, roster.as_deref()).await?;
        }
        Command::Show { user_id } => cli::show::show(&config, &user_id)?,
        Command::Summary => cli::summary::summary(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
    }

    Ok(())
}
