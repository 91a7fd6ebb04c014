//! Ordering queries over an acyclic graph

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

use super::DependencyGraph;

/// Kahn's algorithm; among stages whose dependencies are placed, the
/// earliest declared goes next
pub fn topological_sort(graph: &DependencyGraph) -> Vec<String> {
    let stages = graph.stages();
    let mut in_degree: HashMap<&str, usize> = stages
        .iter()
        .map(|s| (s.name.as_str(), s.needs.len()))
        .collect();

    let mut available: BinaryHeap<Reverse<(usize, &str)>> = stages
        .names()
        .enumerate()
        .filter(|(_, n)| in_degree.get(n) == Some(&0))
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while let Some(Reverse((_, name))) = available.pop() {
        order.push(name.to_string());
        for dependent in graph.dependents_of(name) {
            let Some(degree) = in_degree.get_mut(dependent.as_str()) else {
                continue;
            };
            *degree -= 1;
            if *degree == 0 {
                if let Some(position) = stages.position(dependent) {
                    available.push(Reverse((position, dependent.as_str())));
                }
            }
        }
    }
    order
}

/// Breadth-first walk of dependents, reported in declaration order
pub fn transitive_dependents(graph: &DependencyGraph, name: &str) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([name]);
    while let Some(current) = queue.pop_front() {
        for dependent in graph.dependents_of(current) {
            if seen.insert(dependent.as_str()) {
                queue.push_back(dependent.as_str());
            }
        }
    }
    graph
        .stages()
        .names()
        .filter(|n| seen.contains(n))
        .map(str::to_string)
        .collect()
}
