//! Formula engine API.
//!
//! This module provides the computation core of one evaluation pass:
//!
//! - [`CellValue`], [`Column`], [`Row`], [`Grid`] - Grid snapshot data
//! - [`CellCoordinate`] - Cell reference parsing (A1 notation ↔ column key/row)
//! - [`extract_dependencies`], [`validate_syntax`] - Reference parsing
//! - [`DependencyGraph`] - Formula nodes, cycle checks, evaluation order
//! - [`detect_cycle`] - Depth-first cycle detection
//! - [`evaluate`] - Expression evaluation to a number or [`ErrorToken`]
//! - [`format_number`] - Format results for the result grid

mod cell;
mod cell_ref;
mod cycle;
mod deps;
mod eval;
mod format;
mod graph;

pub use cell::{CellValue, Column, Grid, Row, letter_to_column_key};
pub use cell_ref::{CellCoordinate, column_to_number, number_to_column, render_path};
pub use cycle::detect_cycle;
pub use deps::{
    RangeBounds, SyntaxError, extract_dependencies, extract_dependencies_within, parse_range,
    validate_syntax,
};
pub use eval::{ErrorToken, SheetView, evaluate, evaluate_expression};
pub use format::format_number;
pub use graph::{DependencyGraph, FormulaNode, GraphInfo, GraphStats};
