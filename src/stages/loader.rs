//! Loading a revision's stage set from its `stages/` directory
//!
//! Loading happens in two phases. Generators (executable stage files) are run
//! first and their output is expanded into plain definitions. The flat set is
//! then validated and turned into a dependency graph.

use nix::errno::Errno;
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use super::parse::{parse_generated, parse_stage_file, stage_name_from_file};
use super::{StageDefinition, StageSet};
use crate::error::{BtError, Result};
use crate::executor::process::{run_captured, Capture};
use crate::executor::workspace::Workspace;
use crate::graph::DependencyGraph;
use crate::store::{ObjectStore, TreeFile};

/// Directory holding stage files, relative to the repository root
pub const DEFAULT_STAGES_DIR: &str = "stages";

const SPAWN_RETRIES: u32 = 5;
const SPAWN_RETRY_DELAY: Duration = Duration::from_millis(20);

/// Reads stage files at a revision and expands generators
pub struct StageLoader {
    store: Arc<dyn ObjectStore>,
    stages_dir: String,
    cancel: Arc<AtomicBool>,
}

impl StageLoader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            stages_dir: DEFAULT_STAGES_DIR.to_string(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_stages_dir(mut self, dir: impl Into<String>) -> Self {
        self.stages_dir = dir.into();
        self
    }

    /// Flag that aborts a running generator when raised
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Load and validate the stages of `revision`.
    ///
    /// Declaration order is file-name order, with each generator's stages
    /// inserted where the generator file sits.
    pub fn load(&self, revision: &str) -> Result<DependencyGraph> {
        let files = self.store.read_tree(revision, &self.stages_dir)?;
        let mut workspace: Option<Workspace> = None;
        let mut stages = Vec::new();

        // Subdirectories are not stages
        for file in files.iter().filter(|f| !f.path.contains('/')) {
            let name = stage_name_from_file(&file.path);
            if file.executable {
                if workspace.is_none() {
                    workspace = Some(Workspace::materialize(self.store.as_ref(), revision)?);
                }
                if let Some(ws) = &workspace {
                    stages.extend(self.expand_generator(ws, name, file, revision)?);
                }
            } else {
                let content = std::str::from_utf8(&file.contents)
                    .map_err(|_| BtError::malformed(name, "stage file is not valid UTF-8"))?;
                stages.push(parse_stage_file(name, content)?);
            }
        }

        debug!(revision, count = stages.len(), "loaded stage definitions");
        DependencyGraph::build(StageSet::new(stages)?)
    }

    fn expand_generator(
        &self,
        workspace: &Workspace,
        name: &str,
        file: &TreeFile,
        revision: &str,
    ) -> Result<Vec<StageDefinition>> {
        let program = workspace
            .path()
            .join(self.stages_dir.trim_matches('/'))
            .join(&file.path);
        let command = || {
            let mut cmd = Command::new(&program);
            cmd.current_dir(workspace.path())
                .env("BT_REVISION", revision);
            cmd
        };

        info!(generator = name, revision, "running stage generator");
        let generator_error = |message: String, output: String| BtError::Generator {
            stage: name.to_string(),
            message,
            output,
        };

        let mut attempt = 0;
        let output = loop {
            match run_captured(command(), Capture::Separate, &self.cancel, name) {
                Ok(output) => break output,
                // The file was written moments ago; a concurrent fork may still hold it open
                Err(BtError::Io(e))
                    if e.raw_os_error() == Some(Errno::ETXTBSY as i32)
                        && attempt < SPAWN_RETRIES =>
                {
                    attempt += 1;
                    thread::sleep(SPAWN_RETRY_DELAY);
                }
                Err(BtError::Io(e)) => {
                    return Err(generator_error(
                        format!("could not start: {e}"),
                        String::new(),
                    ))
                }
                Err(e) => return Err(e),
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.success() {
            let mut combined = stdout;
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(generator_error(
                format!("exited with {}", output.status),
                combined,
            ));
        }

        let generated = parse_generated(name, &stdout)?;
        debug!(generator = name, count = generated.len(), "generator expanded");
        Ok(generated)
    }
}

/// Load the stages of `revision` from the default `stages/` directory
pub fn load_stages(store: Arc<dyn ObjectStore>, revision: &str) -> Result<DependencyGraph> {
    StageLoader::new(store).load(revision)
}
