//! One build cycle: POLL, LOAD, then EVALUATE/EXECUTE/PERSIST waves

use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::{debug, info, warn};

use super::Orchestrator;
use crate::error::{BtError, Result};
use crate::graph::DependencyGraph;
use crate::readiness::ready_stages;
use crate::store::{BuildRecord, Status};

/// What one cycle did
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub revision: String,
    /// Records written by this orchestrator, in completion order per wave
    pub executed: Vec<BuildRecord>,
    /// Stages this orchestrator ran but another actor recorded first
    pub recorded_elsewhere: Vec<String>,
}

impl CycleReport {
    /// Number of stages executed and recorded by this cycle
    pub fn executed_count(&self) -> usize {
        self.executed.len()
    }

    pub fn passed(&self) -> usize {
        self.executed.iter().filter(|r| r.status.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.executed.len() - self.passed()
    }
}

/// Result of running one stage inside a wave
enum StageRun {
    Recorded(BuildRecord),
    RecordedElsewhere(String),
}

impl Orchestrator {
    /// Run exactly one cycle against the current revision.
    ///
    /// Load or graph errors abort the cycle before any stage runs. Stage
    /// command failures become FAIL records and block only their dependents.
    pub fn run_once(&self) -> Result<CycleReport> {
        let revision = self.current_revision()?;
        let graph = self.load_graph(&revision)?;
        debug!(revision = %revision, stages = graph.len(), "starting cycle");
        self.run_revision(&revision, &graph)
    }

    /// Drive `revision` to the point where no stage is ready
    pub fn run_revision(&self, revision: &str, graph: &DependencyGraph) -> Result<CycleReport> {
        let mut report = CycleReport {
            revision: revision.to_string(),
            ..Default::default()
        };

        loop {
            if self.shutdown_requested() {
                return Err(BtError::Cancelled(format!("build of {revision}")));
            }

            let ready = ready_stages(&self.results, revision, graph)?;
            if ready.is_empty() {
                break;
            }
            debug!(revision, ready = ?ready, "starting wave");

            for run in self.run_wave(revision, graph, &ready)? {
                match run {
                    StageRun::Recorded(record) => report.executed.push(record),
                    StageRun::RecordedElsewhere(stage) => report.recorded_elsewhere.push(stage),
                }
            }
        }

        if report.executed_count() > 0 {
            info!(
                revision,
                executed = report.executed_count(),
                passed = report.passed(),
                failed = report.failed(),
                "cycle finished"
            );
        }
        Ok(report)
    }

    /// Run pairwise-independent ready stages on at most `max_parallel` threads
    fn run_wave(
        &self,
        revision: &str,
        graph: &DependencyGraph,
        ready: &[String],
    ) -> Result<Vec<StageRun>> {
        let workers = self.config.max_parallel.max(1).min(ready.len());
        let next = AtomicUsize::new(0);
        let outcomes: Mutex<Vec<(usize, Result<StageRun>)>> = Mutex::new(Vec::new());

        thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::SeqCst);
                    let Some(stage) = ready.get(index) else {
                        break;
                    };
                    let outcome = self.run_stage(revision, graph, stage);
                    let failed = outcome.is_err();
                    if let Ok(mut outcomes) = outcomes.lock() {
                        outcomes.push((index, outcome));
                    }
                    if failed || self.shutdown_requested() {
                        break;
                    }
                });
            }
        });

        let mut outcomes = outcomes
            .into_inner()
            .map_err(|_| BtError::store("wave", "worker panicked while reporting"))?;
        outcomes.sort_by_key(|(index, _)| *index);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn run_stage(&self, revision: &str, graph: &DependencyGraph, name: &str) -> Result<StageRun> {
        let stage = graph
            .stage(name)
            .ok_or_else(|| BtError::Graph(format!("stage '{name}' vanished from graph")))?;

        // Readiness guarantees every dependency has a PASS record
        let mut dependency_records = Vec::with_capacity(stage.needs.len());
        for dep in &stage.needs {
            let record = self.results.get(revision, dep)?.ok_or_else(|| {
                BtError::Graph(format!("dependency '{dep}' of '{name}' has no record"))
            })?;
            dependency_records.push(record);
        }

        let outcome = self.executor.run(stage, revision, &dependency_records)?;
        if outcome.status == Status::Fail {
            warn!(revision, stage = name, "stage failed");
        }

        match self.results.put(
            revision,
            name,
            outcome.status,
            &outcome.output_files,
            &outcome.command_output,
            &dependency_records,
        ) {
            Ok(record) => Ok(StageRun::Recorded(record)),
            Err(e) if e.is_benign() => {
                debug!(revision, stage = name, "recorded by another orchestrator");
                Ok(StageRun::RecordedElsewhere(name.to_string()))
            }
            Err(e) => Err(e),
        }
    }
}
