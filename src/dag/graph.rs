use std::collections::{BTreeMap, BTreeSet};

use crate::dag::registry::TaskRegistry;
use crate::dag::resolver::{resolve_waves, Waves};
use crate::engine::TaskName;
use crate::errors::{Result, WavebuildError};

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone, Default)]
struct DagNode {
    /// Direct dependencies: tasks that must succeed before this one can run.
    deps: BTreeSet<TaskName>,
    /// Direct dependents: tasks that depend on this one.
    dependents: BTreeSet<TaskName>,
}

/// In-memory adjacency keyed by task name, built once per registry and
/// treated as immutable for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    nodes: BTreeMap<TaskName, DagNode>,
}

impl DagGraph {
    /// Build the graph from a registry. Dependencies on unregistered names are
    /// kept as edges to absent nodes; `TaskRegistry::validate` rejects them.
    pub fn from_registry(registry: &TaskRegistry) -> Self {
        let mut nodes: BTreeMap<TaskName, DagNode> = BTreeMap::new();

        for task in registry.all() {
            nodes.entry(task.name.clone()).or_default().deps = task.dependencies.clone();
        }

        let edges: Vec<(TaskName, TaskName)> = nodes
            .iter()
            .flat_map(|(name, node)| node.deps.iter().map(move |d| (d.clone(), name.clone())))
            .collect();

        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.insert(dependent);
            }
        }

        Self { nodes }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Immediate dependencies of a task.
    pub fn dependencies_of(&self, name: &str) -> &BTreeSet<TaskName> {
        static EMPTY: BTreeSet<TaskName> = BTreeSet::new();
        self.nodes.get(name).map(|n| &n.deps).unwrap_or(&EMPTY)
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &BTreeSet<TaskName> {
        static EMPTY: BTreeSet<TaskName> = BTreeSet::new();
        self.nodes.get(name).map(|n| &n.dependents).unwrap_or(&EMPTY)
    }

    /// `task -> direct dependencies` for every node.
    pub fn dependency_map(&self) -> BTreeMap<TaskName, BTreeSet<TaskName>> {
        self.nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.deps.clone()))
            .collect()
    }

    /// Waves for the full graph.
    pub fn waves(&self) -> Result<Waves> {
        resolve_waves(&self.dependency_map())
    }

    /// Waves restricted to `subset`; edges leaving the subset are ignored.
    pub fn waves_for(&self, subset: &BTreeSet<TaskName>) -> Result<Waves> {
        let deps = self
            .nodes
            .iter()
            .filter(|(name, _)| subset.contains(*name))
            .map(|(name, node)| (name.clone(), node.deps.clone()))
            .collect();
        resolve_waves(&deps)
    }

    /// Transitive dependency closure of `selected` (including `selected`).
    ///
    /// Fails with `UnknownTask` if a selected name is not in the graph.
    pub fn dependency_closure<'a, I>(&self, selected: I) -> Result<BTreeSet<TaskName>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut stack = Vec::new();
        for name in selected {
            if !self.contains(name) {
                return Err(WavebuildError::UnknownTask {
                    name: name.to_string(),
                    required_by: None,
                });
            }
            stack.push(name.to_string());
        }

        Ok(self.walk(stack, |n| self.dependencies_of(n)))
    }

    /// Transitive dependents of `roots` (including `roots`). Unknown names
    /// are ignored.
    pub fn dependents_closure<'a, I>(&self, roots: I) -> BTreeSet<TaskName>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let stack = roots
            .into_iter()
            .filter(|n| self.contains(n))
            .map(str::to_string)
            .collect();
        self.walk(stack, |n| self.dependents_of(n))
    }

    fn walk<'g, F>(&'g self, mut stack: Vec<TaskName>, next: F) -> BTreeSet<TaskName>
    where
        F: Fn(&str) -> &'g BTreeSet<TaskName>,
    {
        let mut visited = BTreeSet::new();
        while let Some(name) = stack.pop() {
            if !visited.insert(name.clone()) {
                continue;
            }
            stack.extend(next(&name).iter().cloned());
        }
        visited
    }
}
