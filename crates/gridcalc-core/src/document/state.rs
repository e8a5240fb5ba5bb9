use gridcalc_engine::engine::{Column, DependencyGraph, GraphInfo, Grid};

/// A grid snapshot plus the dependency graph of its last evaluation pass.
///
/// The graph is rebuilt from scratch by every [`Document::evaluate`] call;
/// nothing carries over between passes except what `dependency_info` reports.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Rows in order; row index 0 is formula row 1
    pub rows: Grid,
    /// Column schema; formula column letters must equal a key
    pub columns: Vec<Column>,
    /// Graph built by the most recent pass
    pub graph: DependencyGraph,
}

impl Document {
    pub fn new(rows: Grid, columns: Vec<Column>) -> Self {
        Document {
            rows,
            columns,
            graph: DependencyGraph::new(),
        }
    }

    /// Graph statistics, order and dirty cells of the last pass.
    pub fn dependency_info(&self) -> GraphInfo {
        self.graph.info()
    }

    /// Number of cells holding a formula.
    pub fn formula_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .filter(|c| row.get(&c.key).and_then(|v| v.formula()).is_some())
                    .count()
            })
            .sum()
    }
}
