//! Cycle detection for `needs` edges

use std::collections::HashSet;

use crate::error::{BtError, Result};
use crate::stages::StageSet;

/// Fail with `BtError::Cycle` if any stage can reach itself through `needs`.
///
/// Stages are visited in declaration order so the reported path is stable.
pub fn detect_cycles(stages: &StageSet) -> Result<()> {
    let mut visited = HashSet::new();
    let mut on_path = HashSet::new();
    let mut path = Vec::new();

    for name in stages.names() {
        if visited.contains(name) {
            continue;
        }
        if let Some(cycle) = visit(stages, name, &mut visited, &mut on_path, &mut path) {
            return Err(BtError::Cycle { path: cycle });
        }
    }
    Ok(())
}

fn visit<'a>(
    stages: &'a StageSet,
    name: &'a str,
    visited: &mut HashSet<&'a str>,
    on_path: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(name);
    on_path.insert(name);
    path.push(name);

    if let Some(stage) = stages.get(name) {
        for dep in &stage.needs {
            let dep = dep.as_str();
            if on_path.contains(dep) {
                // Close the loop: dep -> ... -> name -> dep
                let start = path.iter().position(|p| *p == dep).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(dep.to_string());
                return Some(cycle);
            }
            if !visited.contains(dep) {
                if let Some(cycle) = visit(stages, dep, visited, on_path, path) {
                    return Some(cycle);
                }
            }
        }
    }

    path.pop();
    on_path.remove(name);
    None
}
