use anyhow::Result;
use clap::Parser;

mod cli;

use cli::{dispatch, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    bt::logging::init(cli.command.common().debug);
    dispatch(cli.command)
}
