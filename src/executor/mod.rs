//! Stage execution
//!
//! A stage runs against a fresh copy of its revision's tree with the result
//! files of its dependencies laid over it. The executor only produces an
//! outcome; persisting it is the orchestrator's job.

pub mod process;
pub mod workspace;

use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{BtError, Result};
use crate::stages::StageDefinition;
use crate::store::{BuildRecord, ResultStore, Status, TreeFile};
use process::{run_captured, Capture};
use workspace::Workspace;

/// Default shell used to interpret `run`
pub const DEFAULT_SHELL: &str = "sh";

/// What a single stage run produced, before it is recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub status: Status,
    /// Declared result files; always empty for `Status::Fail`
    pub output_files: Vec<TreeFile>,
    /// Combined stdout and stderr, byte for byte as produced
    pub command_output: Vec<u8>,
}

/// Runs stage commands in isolated workspaces
#[derive(Clone)]
pub struct StageExecutor {
    results: ResultStore,
    shell: String,
    cancel: Arc<AtomicBool>,
}

impl StageExecutor {
    pub fn new(results: ResultStore, shell: impl Into<String>, cancel: Arc<AtomicBool>) -> Self {
        Self {
            results,
            shell: shell.into(),
            cancel,
        }
    }

    /// Run `stage` against `revision`.
    ///
    /// `dependency_records` must be the records of `stage.needs`, in that
    /// order; their result trees are overlaid so later ones win. A non-zero
    /// exit is a FAIL outcome, not an error. Errors are reserved for setup
    /// problems and cancellation, neither of which may be recorded.
    pub fn run(
        &self,
        stage: &StageDefinition,
        revision: &str,
        dependency_records: &[BuildRecord],
    ) -> Result<StageOutcome> {
        let workspace = Workspace::materialize(self.results.object_store().as_ref(), revision)?;

        for record in dependency_records {
            let files = self.results.result_files(record)?;
            debug!(
                stage = %stage.name,
                dependency = %record.stage,
                files = files.len(),
                "overlaying dependency results"
            );
            workspace.overlay(&files)?;
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(&stage.run)
            .current_dir(workspace.path())
            .env("BT_STAGE", &stage.name)
            .env("BT_REVISION", revision);

        info!(stage = %stage.name, revision, "running stage");
        let output = run_captured(cmd, Capture::Combined, &self.cancel, &stage.name)?;
        let command_output = output.stdout.clone();

        if !output.success() {
            debug!(stage = %stage.name, status = ?output.status, "stage command failed");
            return Ok(StageOutcome {
                status: Status::Fail,
                output_files: Vec::new(),
                command_output,
            });
        }

        match workspace.collect(&stage.name, &stage.results) {
            Ok(output_files) => Ok(StageOutcome {
                status: Status::Pass,
                output_files,
                command_output,
            }),
            Err(err @ BtError::MissingResult { .. }) => {
                warn!(stage = %stage.name, error = %err, "declared result missing, recording FAIL");
                Ok(StageOutcome {
                    status: Status::Fail,
                    output_files: Vec::new(),
                    command_output,
                })
            }
            Err(err) => Err(err),
        }
    }
}
