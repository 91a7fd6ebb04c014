//! Stage definitions and loading
//!
//! Stages live as files under `stages/` at a revision. A plain file is a YAML
//! document with `run`, `needs` and `results`; an executable file is a
//! generator whose standard output is such a document (or several).

mod loader;
mod parse;

pub use loader::{load_stages, StageLoader, DEFAULT_STAGES_DIR};
pub use parse::{parse_generated, parse_stage_file, stage_name_from_file};

use serde::Serialize;
use std::collections::HashMap;

use crate::error::{BtError, Result};

/// Command used when a stage does not declare one
pub const DEFAULT_RUN: &str = "exit 0";

/// A named unit of work at one revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageDefinition {
    pub name: String,
    pub run: String,
    /// Dependency stage names, in declaration order, without duplicates
    pub needs: Vec<String>,
    /// Relative paths or glob patterns the command must produce
    pub results: Vec<String>,
}

impl StageDefinition {
    /// A stage with all defaults
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            run: DEFAULT_RUN.to_string(),
            needs: Vec::new(),
            results: Vec::new(),
        }
    }

    pub fn with_run(mut self, run: impl Into<String>) -> Self {
        self.run = run.into();
        self
    }

    pub fn with_needs<I, S>(mut self, needs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.needs = needs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_results<I, S>(mut self, results: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.results = results.into_iter().map(Into::into).collect();
        self
    }
}

/// Stages of one revision in declaration order, unique by name
#[derive(Debug, Clone, Default)]
pub struct StageSet {
    stages: Vec<StageDefinition>,
    index: HashMap<String, usize>,
}

impl StageSet {
    pub fn new(stages: Vec<StageDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(stages.len());
        for (position, stage) in stages.iter().enumerate() {
            if index.insert(stage.name.clone(), position).is_some() {
                return Err(BtError::Graph(format!(
                    "stage '{}' is defined more than once",
                    stage.name
                )));
            }
        }
        Ok(Self { stages, index })
    }

    pub fn get(&self, name: &str) -> Option<&StageDefinition> {
        self.index.get(name).map(|&i| &self.stages[i])
    }

    /// Declaration position, used to order ties deterministically
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDefinition> {
        self.stages.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
