//! Readiness evaluation
//!
//! Readiness is derived from the result store on every call and never
//! cached, so concurrent orchestrators always decide from current state.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::graph::DependencyGraph;
use crate::store::{BuildRecord, ResultStore, Status};

/// Where a stage stands for one revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Readiness {
    /// A record exists
    Recorded(Status),
    /// Unrecorded, and every dependency passed
    Ready,
    /// Unrecorded, with some dependency not yet recorded
    Waiting,
    /// Unrecorded, and some dependency failed or is itself blocked; will
    /// never become ready for this revision
    Blocked,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        self == Readiness::Ready
    }
}

/// Classify every stage of `graph`, in topological order so each stage is
/// decided after its dependencies
pub fn classify(
    graph: &DependencyGraph,
    records: &BTreeMap<String, BuildRecord>,
) -> BTreeMap<String, Readiness> {
    let mut states: BTreeMap<String, Readiness> = BTreeMap::new();

    for name in graph.topological_order() {
        let state = match records.get(&name) {
            Some(record) => Readiness::Recorded(record.status),
            None => {
                let mut state = Readiness::Ready;
                for dep in graph.dependencies_of(&name) {
                    match states.get(dep) {
                        Some(Readiness::Recorded(Status::Pass)) => {}
                        Some(Readiness::Recorded(Status::Fail)) | Some(Readiness::Blocked) => {
                            state = Readiness::Blocked;
                            break;
                        }
                        _ => state = Readiness::Waiting,
                    }
                }
                state
            }
        };
        states.insert(name, state);
    }
    states
}

/// Per-stage readiness of `revision`, read from the store now
pub fn evaluate(
    results: &ResultStore,
    revision: &str,
    graph: &DependencyGraph,
) -> Result<BTreeMap<String, Readiness>> {
    let records = results.list_records(revision)?;
    Ok(classify(graph, &records))
}

/// Stages that can run now, in declaration order.
///
/// Empty when everything is recorded or every unrecorded stage is blocked
/// or waiting.
pub fn ready_stages(
    results: &ResultStore,
    revision: &str,
    graph: &DependencyGraph,
) -> Result<Vec<String>> {
    let states = evaluate(results, revision, graph)?;
    Ok(graph
        .stages()
        .names()
        .filter(|name| states.get(*name).is_some_and(|s| s.is_ready()))
        .map(str::to_string)
        .collect())
}
