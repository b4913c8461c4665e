//! Dependency graph between calculated fields
//!
//! This module provides functions to:
//! - Build a dependency graph from formula references
//! - Perform topological sort for evaluation ordering
//! - Find reference cycles

use std::collections::{BTreeSet, HashMap};

use crate::schema::FieldId;

/// Fields left unsorted because they sit on, or behind, a reference cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Fields that could be ordered, in evaluation order
    pub resolved: Vec<FieldId>,
    /// Fields that could not, in rank order
    pub remaining: Vec<FieldId>,
}

impl std::fmt::Display for CycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.remaining.iter().map(|f| f.to_string()).collect();
        write!(f, "circular references between calculated fields: {}", names.join(", "))
    }
}

impl std::error::Error for CycleError {}

/// Reference graph over calculated fields
///
/// Nodes are indexed by rank (the order passed to [`DependencyGraph::build`]),
/// which is also the tie-break when several fields are ready at once.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<FieldId>,
    index: HashMap<FieldId, usize>,
    /// node -> nodes it references
    dependencies: Vec<BTreeSet<usize>>,
    /// node -> nodes referencing it
    dependents: Vec<BTreeSet<usize>>,
}

impl DependencyGraph {
    /// Build the graph from calculated fields and the fields their formulas
    /// reference, given in rank order
    ///
    /// References to fields that are not nodes (raw fields, unknown names) do
    /// not create edges. A self reference does.
    pub fn build(fields: Vec<(FieldId, Vec<FieldId>)>) -> Self {
        let mut graph = DependencyGraph::default();

        for (rank, (id, _)) in fields.iter().enumerate() {
            graph.index.entry(id.clone()).or_insert(rank);
            graph.nodes.push(id.clone());
        }
        graph.dependencies = vec![BTreeSet::new(); graph.nodes.len()];
        graph.dependents = vec![BTreeSet::new(); graph.nodes.len()];

        for (rank, (_, references)) in fields.iter().enumerate() {
            for reference in references {
                if let Some(&target) = graph.index.get(reference) {
                    graph.dependencies[rank].insert(target);
                    graph.dependents[target].insert(rank);
                }
            }
        }

        graph
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, field: &FieldId) -> bool {
        self.index.contains_key(field)
    }

    /// Calculated fields `field` references directly
    pub fn dependencies(&self, field: &FieldId) -> Vec<&FieldId> {
        self.index
            .get(field)
            .map(|&i| self.dependencies[i].iter().map(|&d| &self.nodes[d]).collect())
            .unwrap_or_default()
    }

    /// Calculated fields referencing `field` directly
    pub fn dependents(&self, field: &FieldId) -> Vec<&FieldId> {
        self.index
            .get(field)
            .map(|&i| self.dependents[i].iter().map(|&d| &self.nodes[d]).collect())
            .unwrap_or_default()
    }

    /// Perform topological sort using Kahn's algorithm
    ///
    /// Returns fields in evaluation order (dependencies first). Among fields
    /// that are ready at the same time the lowest rank goes first.
    pub fn topological_sort(&self) -> Result<Vec<FieldId>, CycleError> {
        let mut pending: Vec<usize> = self.dependencies.iter().map(BTreeSet::len).collect();
        let mut ready: BTreeSet<usize> = (0..self.nodes.len()).filter(|&i| pending[i] == 0).collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            order.push(node);
            for &dependent in &self.dependents[node] {
                pending[dependent] -= 1;
                if pending[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        let resolved: Vec<FieldId> = order.iter().map(|&i| self.nodes[i].clone()).collect();
        if order.len() == self.nodes.len() {
            return Ok(resolved);
        }

        let sorted: BTreeSet<usize> = order.into_iter().collect();
        let remaining = (0..self.nodes.len())
            .filter(|i| !sorted.contains(i))
            .map(|i| self.nodes[i].clone())
            .collect();
        Err(CycleError {
            resolved,
            remaining,
        })
    }

    /// Reference cycles, each listed in rank order
    ///
    /// Two fields share a cycle when each reaches the other; a field that
    /// references itself is a cycle on its own. Fields that merely depend on
    /// a cycle are not included.
    pub fn cycles(&self) -> Vec<Vec<FieldId>> {
        let reach: Vec<BTreeSet<usize>> = (0..self.nodes.len()).map(|i| self.reachable(i)).collect();
        let mut assigned = vec![false; self.nodes.len()];
        let mut cycles = Vec::new();

        for i in 0..self.nodes.len() {
            if assigned[i] || !reach[i].contains(&i) {
                continue;
            }
            let members: Vec<usize> = reach[i]
                .iter()
                .copied()
                .filter(|&j| reach[j].contains(&i))
                .collect();
            for &j in &members {
                assigned[j] = true;
            }
            cycles.push(members.into_iter().map(|j| self.nodes[j].clone()).collect());
        }

        cycles
    }

    /// Nodes reachable from `start` by following dependencies (excluding
    /// `start` unless it lies on a cycle)
    fn reachable(&self, start: usize) -> BTreeSet<usize> {
        let mut seen = BTreeSet::new();
        let mut stack: Vec<usize> = self.dependencies[start].iter().copied().collect();
        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.dependencies[node].iter().copied());
            }
        }
        seen
    }
}
