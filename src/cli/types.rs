use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bt")]
#[command(about = "Build orchestrator that records stage results in git", long_about = None)]
#[command(version)]
#[command(subcommand_help_heading = "Commands")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Options every command accepts
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Repository directory
    #[arg(short = 'C', long = "dir", default_value = ".")]
    pub dir: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build ready stages of the current revision
    Build {
        #[command(flatten)]
        common: CommonArgs,

        /// Keep polling for new revisions until interrupted
        #[arg(long = "loop")]
        continuous: bool,

        /// Seconds between polls in loop mode (default from bt.toml, else 5)
        #[arg(long)]
        interval: Option<u64>,

        /// Maximum stages to run at once (default from bt.toml, else 4)
        #[arg(short = 'j', long)]
        jobs: Option<usize>,
    },

    /// List stages that are ready to build, one per line
    Ready {
        #[command(flatten)]
        common: CommonArgs,

        /// Revision to query (default: HEAD)
        #[arg(long)]
        revision: Option<String>,
    },

    /// Print recorded results as JSON, one revision per line
    Results {
        #[command(flatten)]
        common: CommonArgs,

        /// Revision to report (default: the most recent revisions)
        #[arg(long)]
        revision: Option<String>,

        /// Number of recent revisions to report
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
}

impl Commands {
    pub fn common(&self) -> &CommonArgs {
        match self {
            Commands::Build { common, .. }
            | Commands::Ready { common, .. }
            | Commands::Results { common, .. } => common,
        }
    }
}
