//! Dependency graph for formula cells.
//!
//! One [`FormulaNode`] per cell holding a formula. Edges point from a
//! dependency to the formula that reads it:
//!
//! ```text
//! A1 → B1  means  "B1 reads A1"
//! ```
//!
//! Plain-value cells may appear as edge sources but never become nodes, so
//! they add nothing to a node's in-degree when ordering.
//!
//! # Invariants
//!
//! 1. If D is a node and `D ∈ N.dependencies` then `N ∈ D.dependents`.
//! 2. Node edges are acyclic; [`DependencyGraph::add_formula`] rejects a
//!    formula that would close a cycle.
//! 3. With an acyclic graph the evaluation order holds every node once, each
//!    after all nodes it reads.
//! 4. Dirty membership is closed under dependents.

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::iter;

use super::cell_ref::render_path;
use super::cycle::detect_cycle;
use super::{CellCoordinate, CellValue};

/// A formula cell and its edges.
#[derive(Clone, Debug, PartialEq)]
pub struct FormulaNode {
    pub coordinate: CellCoordinate,
    pub formula: String,
    /// Cells this formula reads.
    pub dependencies: BTreeSet<CellCoordinate>,
    /// Formula cells that read this one.
    pub dependents: BTreeSet<CellCoordinate>,
    pub last_value: Option<CellValue>,
    pub is_evaluated: bool,
    pub has_error: bool,
    pub error_message: Option<String>,
}

/// Summary numbers for reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total_formulas: usize,
    pub dirty_cells: usize,
    pub evaluation_order_length: usize,
    pub has_cycles: bool,
    pub max_dependencies: usize,
    pub max_dependents: usize,
}

/// Rendered view of the graph for callers that want to inspect it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphInfo {
    pub stats: GraphStats,
    pub evaluation_order: Vec<String>,
    pub dirty_cells: Vec<String>,
    pub has_cycles: bool,
}

#[derive(Default, Debug, Clone)]
pub struct DependencyGraph {
    /// Formula nodes in insertion order; siblings are ordered by this.
    nodes: IndexMap<CellCoordinate, FormulaNode>,
    /// dependency -> formula cells reading it
    forward: HashMap<CellCoordinate, BTreeSet<CellCoordinate>>,
    /// formula cell -> cells it reads
    reverse: HashMap<CellCoordinate, BTreeSet<CellCoordinate>>,
    evaluation_order: Vec<CellCoordinate>,
    dirty: BTreeSet<CellCoordinate>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the formula at `coord`.
    ///
    /// An existing node at `coord` is removed first, together with every edge
    /// touching it in both directions. If the new edges would close a cycle the
    /// formula is not inserted and false is returned; the old formula stays
    /// removed. On success `coord` and its dependents are marked dirty and the
    /// evaluation order is recomputed.
    pub fn add_formula<I>(&mut self, coord: CellCoordinate, formula: &str, dependencies: I) -> bool
    where
        I: IntoIterator<Item = CellCoordinate>,
    {
        if self.nodes.contains_key(&coord) {
            self.remove_node(&coord);
        }

        let dependencies: BTreeSet<CellCoordinate> = dependencies.into_iter().collect();
        debug!(
            "Testing {} for circular dependencies ({} dependencies)",
            coord,
            dependencies.len()
        );
        if self.would_create_cycle(&coord, &dependencies) {
            warn!("Circular dependency detected for cell {}", coord);
            return false;
        }

        for dep in &dependencies {
            self.forward.entry(dep.clone()).or_default().insert(coord.clone());
            self.reverse.entry(coord.clone()).or_default().insert(dep.clone());
            if let Some(node) = self.nodes.get_mut(dep) {
                node.dependents.insert(coord.clone());
            }
        }

        // Formulas added earlier may already read this cell.
        let dependents: BTreeSet<CellCoordinate> = self
            .forward
            .get(&coord)
            .into_iter()
            .flatten()
            .filter(|c| self.nodes.contains_key(*c))
            .cloned()
            .collect();

        self.nodes.insert(
            coord.clone(),
            FormulaNode {
                coordinate: coord.clone(),
                formula: formula.to_string(),
                dependencies,
                dependents,
                last_value: None,
                is_evaluated: false,
                has_error: false,
                error_message: None,
            },
        );

        self.mark_dirty(&coord);
        self.update_evaluation_order();

        info!("Added formula {} for cell {}", formula, coord);
        true
    }

    /// Discard the formula at `coord`. Returns false if there was none.
    pub fn remove_formula(&mut self, coord: &CellCoordinate) -> bool {
        if !self.nodes.contains_key(coord) {
            return false;
        }
        self.remove_node(coord);
        self.update_evaluation_order();
        true
    }

    fn remove_node(&mut self, coord: &CellCoordinate) {
        let Some(former) = self.nodes.get(coord).map(|n| n.dependents.clone()) else {
            return;
        };
        // Readers of this cell see new content.
        for dependent in &former {
            self.mark_dirty(dependent);
        }

        let Some(node) = self.nodes.shift_remove(coord) else {
            return;
        };

        for dep in &node.dependencies {
            if let Some(readers) = self.forward.get_mut(dep) {
                readers.remove(coord);
                if readers.is_empty() {
                    self.forward.remove(dep);
                }
            }
            if let Some(dep_node) = self.nodes.get_mut(dep) {
                dep_node.dependents.remove(coord);
            }
        }

        for dependent in &node.dependents {
            if let Some(reads) = self.reverse.get_mut(dependent) {
                reads.remove(coord);
            }
            if let Some(dependent_node) = self.nodes.get_mut(dependent) {
                dependent_node.dependencies.remove(coord);
            }
        }

        self.forward.remove(coord);
        self.reverse.remove(coord);
        self.dirty.remove(coord);
    }

    /// Would inserting `coord` reading `dependencies` create a cycle anywhere
    /// in the graph?
    pub fn would_create_cycle(
        &self,
        coord: &CellCoordinate,
        dependencies: &BTreeSet<CellCoordinate>,
    ) -> bool {
        let roots = self.nodes.keys().chain(iter::once(coord));
        detect_cycle(roots, |n| self.hypothetical_neighbors(n, coord, dependencies)).is_some()
    }

    /// The cycle `coord` reading `dependencies` would close, as a path that
    /// starts and ends at `coord`.
    pub fn cycle_through<'a, I>(&self, coord: &CellCoordinate, dependencies: I) -> Option<Vec<CellCoordinate>>
    where
        I: IntoIterator<Item = &'a CellCoordinate>,
    {
        let dependencies: BTreeSet<CellCoordinate> = dependencies.into_iter().cloned().collect();
        detect_cycle(iter::once(coord), |n| {
            self.hypothetical_neighbors(n, coord, &dependencies)
        })
    }

    fn hypothetical_neighbors(
        &self,
        node: &CellCoordinate,
        coord: &CellCoordinate,
        dependencies: &BTreeSet<CellCoordinate>,
    ) -> Vec<CellCoordinate> {
        let mut out: Vec<CellCoordinate> = self
            .forward
            .get(node)
            .into_iter()
            .flatten()
            .cloned()
            .collect();
        if dependencies.contains(node) {
            out.push(coord.clone());
        }
        out
    }

    /// Full-graph cycle check. Returns a cycle witness path such as
    /// `[A1, B1, A1]` if the formula edges contain a cycle.
    pub fn has_circular_dependency(&self) -> Option<Vec<CellCoordinate>> {
        detect_cycle(self.nodes.keys(), |n| self.formula_dependents(n))
    }

    pub fn has_cycles(&self) -> bool {
        self.has_circular_dependency().is_some()
    }

    fn formula_dependents(&self, coord: &CellCoordinate) -> Vec<CellCoordinate> {
        self.forward
            .get(coord)
            .into_iter()
            .flatten()
            .filter(|c| self.nodes.contains_key(*c))
            .cloned()
            .collect()
    }

    /// Mark `coord` and every formula that transitively reads it dirty.
    pub fn mark_dirty(&mut self, coord: &CellCoordinate) {
        let mut queue = VecDeque::from([coord.clone()]);
        let mut seen = HashSet::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            queue.extend(self.formula_dependents(&current));
            if self.nodes.contains_key(&current) {
                self.dirty.insert(current);
            }
        }
    }

    /// Kahn's algorithm over formula-to-formula edges.
    fn update_evaluation_order(&mut self) {
        if self.nodes.is_empty() {
            self.evaluation_order.clear();
            debug!("No formula nodes to sort");
            return;
        }

        let mut in_degree: HashMap<&CellCoordinate, usize> = self
            .nodes
            .values()
            .map(|node| {
                let count = node
                    .dependencies
                    .iter()
                    .filter(|d| self.nodes.contains_key(*d))
                    .count();
                (&node.coordinate, count)
            })
            .collect();

        let mut queue: VecDeque<&CellCoordinate> = self
            .nodes
            .keys()
            .filter(|c| in_degree.get(c).copied() == Some(0))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(current) = queue.pop_front() {
            order.push(current.clone());
            for dependent in self.forward.get(current).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            error!(
                "Topological sort failed - circular dependency among formulas. Processed {}/{} nodes",
                order.len(),
                self.nodes.len()
            );
        }
        debug!("Updated evaluation order: {}", render_path(&order));
        self.evaluation_order = order;
    }

    /// Topological order of the formula cells. Shorter than [`Self::len`]
    /// when some nodes sit on an unresolved cycle.
    pub fn evaluation_order(&self) -> &[CellCoordinate] {
        &self.evaluation_order
    }

    /// Record the outcome of evaluating `coord` and clear its dirty flag.
    pub fn mark_evaluated(
        &mut self,
        coord: &CellCoordinate,
        value: CellValue,
        has_error: bool,
        error_message: Option<String>,
    ) {
        if let Some(node) = self.nodes.get_mut(coord) {
            node.last_value = Some(value);
            node.is_evaluated = true;
            node.has_error = has_error;
            node.error_message = error_message;
            self.dirty.remove(coord);
        }
    }

    /// Cells the formula at `coord` reads (empty for non-formula cells).
    pub fn precedents(&self, coord: &CellCoordinate) -> impl Iterator<Item = &CellCoordinate> {
        self.reverse.get(coord).into_iter().flatten()
    }

    /// Formula cells that read `coord`, whether or not `coord` holds a formula.
    pub fn readers(&self, coord: &CellCoordinate) -> impl Iterator<Item = &CellCoordinate> {
        self.forward.get(coord).into_iter().flatten()
    }

    pub fn dirty_cells(&self) -> &BTreeSet<CellCoordinate> {
        &self.dirty
    }

    pub fn node(&self, coord: &CellCoordinate) -> Option<&FormulaNode> {
        self.nodes.get(coord)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &FormulaNode> {
        self.nodes.values()
    }

    pub fn contains(&self, coord: &CellCoordinate) -> bool {
        self.nodes.contains_key(coord)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            total_formulas: self.nodes.len(),
            dirty_cells: self.dirty.len(),
            evaluation_order_length: self.evaluation_order.len(),
            has_cycles: self.has_cycles(),
            max_dependencies: self.nodes.values().map(|n| n.dependencies.len()).max().unwrap_or(0),
            max_dependents: self.nodes.values().map(|n| n.dependents.len()).max().unwrap_or(0),
        }
    }

    pub fn info(&self) -> GraphInfo {
        let stats = self.stats();
        GraphInfo {
            has_cycles: stats.has_cycles,
            stats,
            evaluation_order: self.evaluation_order.iter().map(|c| c.to_string()).collect(),
            dirty_cells: self.dirty.iter().map(|c| c.to_string()).collect(),
        }
    }
}
