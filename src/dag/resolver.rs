// src/dag/resolver.rs

//! Wave resolution: Kahn's algorithm with lexicographic tie-breaking.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::engine::TaskName;
use crate::errors::{Result, WavebuildError};

/// Ordered execution waves. Every task's dependencies sit in a strictly
/// earlier wave; tasks inside a wave are sorted by name.
pub type Waves = Vec<Vec<TaskName>>;

/// Resolve a dependency map (`task -> direct dependencies`) into waves.
///
/// The key set is the node set. Dependencies that are not keys are ignored,
/// which lets callers resolve a restricted sub-graph (e.g. a closure) with
/// the full dependency lists.
///
/// Fails with [`WavebuildError::CycleDetected`] naming every task that lies
/// on a cycle.
pub fn resolve_waves(deps: &BTreeMap<TaskName, BTreeSet<TaskName>>) -> Result<Waves> {
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for (task, task_deps) in deps {
        let degree = task_deps.iter().filter(|d| deps.contains_key(*d)).count();
        in_degree.insert(task.as_str(), degree);
        for dep in task_deps.iter().filter(|d| deps.contains_key(*d)) {
            dependents.entry(dep.as_str()).or_default().push(task.as_str());
        }
    }

    let mut waves: Waves = Vec::new();
    let mut ready: BTreeSet<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| *name)
        .collect();
    let mut placed = 0usize;

    while !ready.is_empty() {
        let wave: Vec<&str> = ready.iter().copied().collect();
        let mut next = BTreeSet::new();

        for name in &wave {
            for dependent in dependents.get(name).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.insert(*dependent);
                    }
                }
            }
        }

        placed += wave.len();
        waves.push(wave.into_iter().map(str::to_string).collect());
        ready = next;
    }

    if placed < deps.len() {
        let remaining: BTreeSet<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(name, _)| *name)
            .collect();
        let cycle = tasks_on_cycles(deps, &remaining);
        debug!(?cycle, "resolver: cycle detected");
        return Err(WavebuildError::CycleDetected(cycle));
    }

    Ok(waves)
}

/// Members of non-trivial strongly connected components (and self-loops)
/// among `remaining`, sorted by name.
///
/// `remaining` contains cycle members and everything downstream of them;
/// only the former are reported.
fn tasks_on_cycles(
    deps: &BTreeMap<TaskName, BTreeSet<TaskName>>,
    remaining: &BTreeSet<&str>,
) -> Vec<TaskName> {
    // Edge direction: dep -> task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in remaining {
        graph.add_node(name);
    }
    for name in remaining {
        for dep in deps.get(*name).into_iter().flatten() {
            if remaining.contains(dep.as_str()) {
                graph.add_edge(dep.as_str(), name, ());
            }
        }
    }

    let mut on_cycle: Vec<TaskName> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .flatten()
        .map(str::to_string)
        .collect();
    on_cycle.sort();
    on_cycle
}
