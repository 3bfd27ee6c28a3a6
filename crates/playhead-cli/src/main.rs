//! Playhead CLI - Ad Tag and Live Stream Inspection Tool
//!
//! Features:
//! - VAST tag probing (creative selection, skip offset, tracking URLs)
//! - Channel listing inspection
//! - Timeshift/DVR URL resolution
//! - Program guide timeline math

use clap::{Parser, Subcommand};

mod commands;
mod output;

/// Playhead CLI - playback orchestration toolkit
#[derive(Parser)]
#[command(name = "playhead-cli")]
#[command(version)]
#[command(about = "Ad tag and live stream inspection toolkit", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a VAST tag and report the creative that would play
    Vast {
        /// URL of the VAST tag
        tag: String,

        /// Skip delay to assume when the creative declares none (seconds)
        #[arg(short, long, default_value = "15")]
        skip_delay: f64,
    },

    /// Fetch and display a channel listing
    Channels {
        /// URL of the channel listing endpoint
        url: String,
    },

    /// Build a timeshift/DVR playback URL for a channel
    Dvr {
        /// URL of the channel listing endpoint
        url: String,

        /// Channel id
        channel: String,

        /// DVR endpoint base URL
        #[arg(long)]
        dvr_base: String,

        /// Archive range start (epoch seconds)
        #[arg(long)]
        start: i64,

        /// Archive range end (epoch seconds)
        #[arg(long)]
        end: i64,
    },

    /// Show where a timestamp falls on the guide timeline
    Timeline {
        /// Timestamp (epoch seconds)
        timestamp: i64,
    },

    /// Guess the provider a media URL would play through
    Probe {
        /// Media URL
        url: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(level).init();

    match cli.command {
        Commands::Vast { tag, skip_delay } => {
            commands::vast(&tag, skip_delay, &cli.format).await?;
        }
        Commands::Channels { url } => {
            commands::channels(&url, &cli.format).await?;
        }
        Commands::Dvr {
            url,
            channel,
            dvr_base,
            start,
            end,
        } => {
            commands::dvr(&url, &channel, &dvr_base, start, end).await?;
        }
        Commands::Timeline { timestamp } => {
            commands::timeline(timestamp)?;
        }
        Commands::Probe { url } => {
            commands::probe(&url)?;
        }
    }

    Ok(())
}
