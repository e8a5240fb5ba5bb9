use super::Document;
use super::report::{Evaluation, EvaluationStats, cell_key};
use gridcalc_engine::engine::{
    CellCoordinate, CellValue, Column, DependencyGraph, RangeBounds, Row, column_to_number,
    evaluate, extract_dependencies_within, format_number, letter_to_column_key, render_path,
};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;

/// Evaluate a grid snapshot in one pass. The input is not modified.
pub fn evaluate_grid(rows: &[Row], columns: &[Column]) -> Evaluation {
    let mut doc = Document::new(rows.to_vec(), columns.to_vec());
    doc.evaluate()
}

/// What building the graph found besides the graph itself.
#[derive(Default)]
struct BuildOutcome {
    /// Cells whose formula was rejected for closing a cycle
    circular_errors: BTreeMap<String, String>,
    /// Cycle closed by the first rejected formula
    rejected_cycle: Option<Vec<CellCoordinate>>,
}

impl Document {
    /// Run a full pass: build the graph, check cycles, evaluate in order.
    ///
    /// A cycle aborts the pass and returns the rows unchanged. Otherwise each
    /// formula cell in the returned grid holds its rendered result or error
    /// token, and every error token is listed in `errors`.
    pub fn evaluate(&mut self) -> Evaluation {
        info!(
            "Evaluating formulas for grid with {} rows and {} columns",
            self.rows.len(),
            self.columns.len()
        );
        let outcome = self.build_graph();

        let cycle = self.graph.has_circular_dependency().or(outcome.rejected_cycle);
        if let Some(path) = cycle {
            return self.abort_on_cycle(path, outcome.circular_errors);
        }

        let order = self.graph.evaluation_order().to_vec();
        info!("Evaluating {} formulas in dependency order", order.len());

        let mut working = self.rows.clone();
        let mut stats = EvaluationStats::default();
        let mut cell_errors = BTreeMap::new();

        for coord in &order {
            let Some(node) = self.graph.node(coord) else {
                continue;
            };
            if node.is_evaluated {
                stats.cached_count += 1;
                continue;
            }
            let formula = node.formula.clone();

            let row_index = coord.row_index();
            let column_key = letter_to_column_key(&coord.column, &self.columns);
            let Some(column_key) = column_key.filter(|_| row_index < working.len()) else {
                warn!("Invalid cell reference: {}", coord);
                cell_errors.insert(
                    cell_key(row_index, &coord.column),
                    "Invalid cell reference".to_string(),
                );
                stats.error_count += 1;
                continue;
            };
            let column_key = column_key.to_string();

            let result = evaluate(&formula, row_index, &column_key, &working, &self.columns);
            debug!("Evaluated {}: {} = {:?}", coord, formula, result);
            match result {
                Ok(value) => {
                    working[row_index].insert(column_key, CellValue::Text(format_number(value)));
                    self.graph
                        .mark_evaluated(coord, CellValue::Number(value), false, None);
                    stats.evaluated_count += 1;
                }
                Err(token) => {
                    let rendered = token.to_string();
                    working[row_index].insert(column_key.clone(), CellValue::Text(rendered.clone()));
                    self.graph.mark_evaluated(
                        coord,
                        CellValue::Text(rendered.clone()),
                        true,
                        Some(rendered.clone()),
                    );
                    cell_errors.insert(cell_key(row_index, &column_key), rendered);
                    stats.error_count += 1;
                }
            }
        }

        stats.graph = self.graph.stats();
        stats.evaluation_order = order.iter().map(|c| c.to_string()).collect();

        let mut errors = outcome.circular_errors;
        errors.extend(cell_errors);
        let evaluation = Evaluation::succeeded(working, errors, stats);
        info!("Formula evaluation completed: {}", evaluation.message);
        evaluation
    }

    /// Scan every declared column of every row and add its formula, if any.
    fn build_graph(&mut self) -> BuildOutcome {
        self.graph = DependencyGraph::new();
        let mut outcome = BuildOutcome::default();

        for (row_index, row) in self.rows.iter().enumerate() {
            for column in &self.columns {
                let Some(formula) = row.get(&column.key).and_then(CellValue::formula) else {
                    continue;
                };
                let coord = CellCoordinate::new(column.key.clone(), row_index + 1);
                let dependencies = resolve_dependencies(formula, self.rows.len(), &self.columns);
                debug!(
                    "Adding formula {} for cell {} with {} dependencies",
                    formula,
                    coord,
                    dependencies.len()
                );

                if !self
                    .graph
                    .add_formula(coord.clone(), formula, dependencies.iter().cloned())
                {
                    warn!("Failed to add formula {} for cell {}", formula, coord);
                    outcome.circular_errors.insert(
                        cell_key(row_index, &column.key),
                        "Circular dependency detected".to_string(),
                    );
                    if outcome.rejected_cycle.is_none() {
                        outcome.rejected_cycle = self.graph.cycle_through(&coord, &dependencies);
                    }
                }
            }
        }

        info!("Built dependency graph with {} formula nodes", self.graph.len());
        outcome
    }

    fn abort_on_cycle(
        &self,
        path: Vec<CellCoordinate>,
        mut errors: BTreeMap<String, String>,
    ) -> Evaluation {
        let rendered = render_path(&path);
        error!("Circular dependency detected: {}", rendered);
        for coord in &path {
            if coord.row >= 1 && coord.row <= self.rows.len() {
                errors.insert(
                    cell_key(coord.row_index(), &coord.column),
                    format!("Circular dependency: {}", rendered),
                );
            }
        }
        Evaluation::cycle_abort(self.rows.clone(), errors, path, &rendered)
    }
}

/// Extent of the grid in formula coordinates: columns up to the last lettered
/// schema key, rows 1 to `row_count`. None if no cell can be referenced.
fn grid_area(row_count: usize, columns: &[Column]) -> Option<RangeBounds> {
    let last_col = columns
        .iter()
        .filter(|c| !c.key.is_empty() && c.key.bytes().all(|b| b.is_ascii_uppercase()))
        .filter_map(|c| column_to_number(&c.key))
        .max()?;
    (row_count > 0).then_some(RangeBounds {
        first_col: 1,
        last_col,
        first_row: 1,
        last_row: row_count,
    })
}

/// Dependencies of `formula` mapped onto the schema. Ranges are clipped to the
/// grid; references to unknown columns or rows outside the grid are dropped
/// and do not constrain order.
fn resolve_dependencies(formula: &str, row_count: usize, columns: &[Column]) -> Vec<CellCoordinate> {
    let Some(area) = grid_area(row_count, columns) else {
        return Vec::new();
    };
    let mut resolved: Vec<CellCoordinate> = extract_dependencies_within(formula, Some(&area))
        .into_iter()
        .filter_map(|dep| {
            let Some(key) = letter_to_column_key(&dep.column, columns) else {
                warn!("Dependency {} references non-existent column", dep);
                return None;
            };
            if dep.row < 1 || dep.row > row_count {
                warn!("Dependency {} references non-existent row", dep);
                return None;
            }
            Some(CellCoordinate::new(key, dep.row))
        })
        .collect();
    resolved.sort();
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_engine::engine::Grid;

    fn columns(keys: &[&str]) -> Vec<Column> {
        keys.iter().map(|k| Column::new(*k, *k)).collect()
    }

    fn grid(rows: &[&[(&str, &str)]]) -> Grid {
        rows.iter()
            .map(|cells| {
                cells
                    .iter()
                    .map(|(k, v)| (k.to_string(), CellValue::from(*v)))
                    .collect()
            })
            .collect()
    }

    fn text(s: &str) -> CellValue {
        CellValue::from(s)
    }

    #[test]
    fn test_cell_plus_literal() {
        let result = evaluate_grid(&grid(&[&[("A", "5"), ("B", "=A1+3")]]), &columns(&["A", "B"]));
        assert!(result.success);
        assert_eq!(result.data[0]["B"], text("8"));
        assert_eq!(result.data[0]["A"], text("5"));
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_sum_range() {
        let result = evaluate_grid(
            &grid(&[&[("A", "10"), ("B", "20"), ("C", "=SUM(A1:B1)")]]),
            &columns(&["A", "B", "C"]),
        );
        assert!(result.success);
        assert_eq!(result.data[0]["C"], text("30"));
    }

    #[test]
    fn test_mutual_cycle_aborts_with_original_grid() {
        let data = grid(&[&[("A", "=A2")], &[("A", "=A1")]]);
        let result = evaluate_grid(&data, &columns(&["A"]));
        assert!(!result.success);
        assert_eq!(result.data, data);
        let path = result.cycle.clone().unwrap();
        assert!(!path.is_empty());
        assert_eq!(path.first(), path.last());
        assert_eq!(
            result.error.as_deref(),
            Some("Circular dependency detected: A2 -> A1 -> A2")
        );
        assert_eq!(
            result.errors["0-A"],
            "Circular dependency: A2 -> A1 -> A2"
        );
        assert_eq!(
            result.errors["1-A"],
            "Circular dependency: A2 -> A1 -> A2"
        );
        assert!(result.stats.is_none());
    }

    #[test]
    fn test_self_reference_aborts() {
        let data = grid(&[&[("A", "=A1+1")]]);
        let result = evaluate_grid(&data, &columns(&["A"]));
        assert!(!result.success);
        assert_eq!(result.data, data);
        assert_eq!(result.errors["0-A"], "Circular dependency: A1 -> A1");
    }

    #[test]
    fn test_average_and_max() {
        let cols = columns(&["A", "B"]);
        let result = evaluate_grid(&grid(&[&[("A", "4"), ("B", "=AVERAGE(A1:A1)")]]), &cols);
        assert_eq!(result.data[0]["B"], text("4"));

        let result = evaluate_grid(
            &grid(&[&[("A", "3"), ("B", "=MAX(A1:A3)")], &[("A", "")], &[("A", "7")]]),
            &cols,
        );
        assert_eq!(result.data[0]["B"], text("7"));
    }

    #[test]
    fn test_division_by_zero_is_reported_per_cell() {
        let result = evaluate_grid(
            &grid(&[&[("A", "=A2/B1"), ("B", "0"), ("C", "=A1+1")], &[("A", "6")]]),
            &columns(&["A", "B", "C"]),
        );
        assert!(result.success);
        assert_eq!(result.data[0]["A"], text("#DIV/0!"));
        assert_eq!(result.errors["0-A"], "#DIV/0!");
        // Error results read as 0 downstream.
        assert_eq!(result.data[0]["C"], text("1"));
        let stats = result.stats.unwrap();
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.evaluated_count, 1);
    }

    #[test]
    fn test_chained_formulas_see_earlier_results() {
        let result = evaluate_grid(
            &grid(&[&[("A", "=B1*2"), ("B", "=C1+1"), ("C", "2.25")]]),
            &columns(&["A", "B", "C"]),
        );
        assert_eq!(result.data[0]["B"], text("3.25"));
        assert_eq!(result.data[0]["A"], text("6.5"));
        let order = result.stats.unwrap().evaluation_order;
        assert_eq!(order, vec!["B1", "A1"]);
    }

    #[test]
    fn test_unknown_columns_and_rows_are_dropped() {
        let result = evaluate_grid(
            &grid(&[&[("A", "=Z1+B9")], &[("A", "=FOO(A1)")]]),
            &columns(&["A"]),
        );
        assert!(result.success);
        // Z1 and B9 read as 0; the split resolves both as cell references.
        assert_eq!(result.data[0]["A"], text("0"));
        assert_eq!(result.data[1]["A"], text("#NAME?"));
        assert_eq!(result.errors["1-A"], "#NAME?");
    }

    #[test]
    fn test_numbers_and_nulls_are_not_formulas() {
        let mut row = Row::new();
        row.insert("A".to_string(), CellValue::Number(2.0));
        row.insert("B".to_string(), CellValue::Empty);
        row.insert("C".to_string(), text("=A1*10"));
        let result = evaluate_grid(&[row], &columns(&["A", "B", "C"]));
        assert_eq!(result.data[0]["A"], CellValue::Number(2.0));
        assert_eq!(result.data[0]["B"], CellValue::Empty);
        assert_eq!(result.data[0]["C"], text("20"));
    }

    #[test]
    fn test_graph_retained_for_dependency_info() {
        let mut doc = Document::new(
            grid(&[&[("A", "1"), ("B", "=A1"), ("C", "=B1+A1")]]),
            columns(&["A", "B", "C"]),
        );
        let result = doc.evaluate();
        assert!(result.success);
        let info = doc.dependency_info();
        assert_eq!(info.evaluation_order, vec!["B1", "C1"]);
        assert!(info.dirty_cells.is_empty());
        assert_eq!(info.stats.total_formulas, 2);
        assert_eq!(info.stats.max_dependencies, 2);
        assert!(doc.graph.node(&CellCoordinate::new("C", 1)).unwrap().is_evaluated);
    }

    #[test]
    fn test_evaluate_twice_rebuilds() {
        let mut doc = Document::new(grid(&[&[("A", "2"), ("B", "=A1*A1")]]), columns(&["A", "B"]));
        let first = doc.evaluate();
        let second = doc.evaluate();
        assert_eq!(first, second);
        assert_eq!(second.stats.unwrap().cached_count, 0);
    }

    #[test]
    fn test_resolve_dependencies_filters() {
        let cols = columns(&["A", "B"]);
        let deps = resolve_dependencies("=SUM(A1:C2)+B7", 2, &cols);
        let rendered: Vec<String> = deps.iter().map(|c| c.to_string()).collect();
        assert_eq!(rendered, vec!["A1", "A2", "B1", "B2"]);
    }

    #[test]
    fn test_whole_column_range_orders_after_its_inputs() {
        let result = evaluate_grid(
            &grid(&[&[("A", "5"), ("B", "=SUM(A1:A1048576)")], &[("A", "=A1*2")]]),
            &columns(&["A", "B"]),
        );
        assert!(result.success);
        assert_eq!(result.data[1]["A"], text("10"));
        assert_eq!(result.data[0]["B"], text("15"));
        assert_eq!(result.stats.unwrap().evaluation_order, vec!["A2", "B1"]);
    }

    #[test]
    fn test_whole_column_range_over_itself_is_a_cycle() {
        let data = grid(&[&[("A", "=SUM(A1:A1048576)")], &[("A", "3")]]);
        let result = evaluate_grid(&data, &columns(&["A"]));
        assert!(!result.success);
        assert_eq!(result.data, data);
        assert_eq!(result.errors["0-A"], "Circular dependency: A1 -> A1");
    }

    #[test]
    fn test_grid_area() {
        assert_eq!(
            grid_area(4, &columns(&["A", "C", "name"])),
            Some(RangeBounds {
                first_col: 1,
                last_col: 3,
                first_row: 1,
                last_row: 4
            })
        );
        assert_eq!(grid_area(0, &columns(&["A"])), None);
        assert_eq!(grid_area(3, &columns(&["name"])), None);
    }
}
