//! `bt build`: run one cycle, or keep running with `--loop`

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::common::open;
use crate::orchestrator::{CycleReport, Orchestrator};
use crate::store::Status;

pub struct BuildOptions<'a> {
    pub dir: &'a Path,
    pub continuous: bool,
    pub interval_secs: Option<u64>,
    pub jobs: Option<usize>,
}

pub fn execute(options: BuildOptions<'_>) -> Result<()> {
    let (store, config) = open(options.dir)?;
    let config = config.with_overrides(options.interval_secs, options.jobs)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let orchestrator = Orchestrator::new(store, config.orchestrator_config(), shutdown);

    if options.continuous {
        orchestrator.run_continuous(print_report);
        return Ok(());
    }

    let report = orchestrator.run_once().context("Build cycle failed")?;
    print_report(&report);
    Ok(())
}

fn print_report(report: &CycleReport) {
    for record in &report.executed {
        let status = match record.status {
            Status::Pass => "PASS".green().bold(),
            Status::Fail => "FAIL".red().bold(),
        };
        println!(
            "{status} {} {}",
            record.stage,
            short(&record.commit).dimmed()
        );
    }
}

fn short(commit: &str) -> &str {
    commit.get(..12).unwrap_or(commit)
}
