//! Orchestrator struct and configuration

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::executor::{StageExecutor, DEFAULT_SHELL};
use crate::graph::DependencyGraph;
use crate::stages::{StageLoader, DEFAULT_STAGES_DIR};
use crate::store::{ObjectStore, ResultStore};

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Sleep between cycles in continuous mode
    pub poll_interval: Duration,
    /// Upper bound on stages running at once
    pub max_parallel: usize,
    /// Shell that interprets each stage's `run`
    pub shell: String,
    /// Stage file directory, relative to the repository root
    pub stages_dir: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_parallel: 4,
            shell: DEFAULT_SHELL.to_string(),
            stages_dir: DEFAULT_STAGES_DIR.to_string(),
        }
    }
}

/// Runs build cycles against one object store
pub struct Orchestrator {
    pub(super) config: OrchestratorConfig,
    pub(super) store: Arc<dyn ObjectStore>,
    pub(super) results: ResultStore,
    pub(super) loader: StageLoader,
    pub(super) executor: StageExecutor,
    /// Raised externally to stop; also cancels running stages
    pub(super) shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        config: OrchestratorConfig,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let results = ResultStore::new(Arc::clone(&store));
        let loader = StageLoader::new(Arc::clone(&store))
            .with_stages_dir(config.stages_dir.clone())
            .with_cancel(Arc::clone(&shutdown));
        let executor = StageExecutor::new(results.clone(), config.shell.clone(), Arc::clone(&shutdown));
        Self {
            config,
            store,
            results,
            loader,
            executor,
            shutdown,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    /// Load the validated stage graph of `revision`
    pub fn load_graph(&self, revision: &str) -> Result<DependencyGraph> {
        self.loader.load(revision)
    }

    pub fn current_revision(&self) -> Result<String> {
        self.store.current_revision()
    }

    pub(super) fn shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}
