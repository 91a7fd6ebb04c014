//! Dependency graph over one revision's stage set

mod cycle;
mod scheduling;


use std::collections::HashMap;

use crate::error::{BtError, Result};
use crate::stages::{StageDefinition, StageSet};

/// Stages and their `needs` edges, validated and acyclic
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    stages: StageSet,
    /// Adjacency list: stage -> stages that need it, in declaration order
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build a graph from a loaded stage set.
    ///
    /// Fails with `Graph` for an undefined or self-referencing need and with
    /// `Cycle` if the edges form a cycle. Nothing is returned on failure.
    pub fn build(stages: StageSet) -> Result<Self> {
        let mut dependents: HashMap<String, Vec<String>> =
            stages.names().map(|n| (n.to_string(), Vec::new())).collect();

        for stage in stages.iter() {
            for dep in &stage.needs {
                if dep == &stage.name {
                    return Err(BtError::Graph(format!(
                        "stage '{}' needs itself",
                        stage.name
                    )));
                }
                match dependents.get_mut(dep) {
                    Some(list) => list.push(stage.name.clone()),
                    None => {
                        return Err(BtError::Graph(format!(
                            "stage '{}' needs undefined stage '{dep}'",
                            stage.name
                        )))
                    }
                }
            }
        }

        cycle::detect_cycles(&stages)?;

        Ok(Self { stages, dependents })
    }

    pub fn stages(&self) -> &StageSet {
        &self.stages
    }

    pub fn stage(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.get(name)
    }

    /// Direct dependencies, in `needs` order
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.stages
            .get(name)
            .map(|s| s.needs.as_slice())
            .unwrap_or_default()
    }

    /// Stages that directly need `name`, in declaration order
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.dependents
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every stage that transitively depends on `name`
    pub fn transitive_dependents(&self, name: &str) -> Vec<String> {
        scheduling::transitive_dependents(self, name)
    }

    /// Stages ordered so each comes after all of its dependencies; ties
    /// follow declaration order
    pub fn topological_order(&self) -> Vec<String> {
        scheduling::topological_sort(self)
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
