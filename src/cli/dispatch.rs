use anyhow::Result;
use bt::commands::build::{self, BuildOptions};
use bt::commands::{ready, results};

use super::types::Commands;

pub fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Build {
            common,
            continuous,
            interval,
            jobs,
        } => build::execute(BuildOptions {
            dir: &common.dir,
            continuous,
            interval_secs: interval,
            jobs,
        }),
        Commands::Ready { common, revision } => ready::execute(&common.dir, revision.as_deref()),
        Commands::Results {
            common,
            revision,
            count,
        } => results::execute(&common.dir, revision.as_deref(), count),
    }
}
