//! gridcalc-core - Evaluation pass, formula validation and storage.

pub mod document;
pub mod error;
pub mod storage;

pub use document::{
    Document, Evaluation, EvaluationStats, FormulaValidation, evaluate_grid, validate_formula,
};
pub use error::{GridcalcError, Result};

pub use gridcalc_engine::engine::{CellCoordinate, CellValue, Column, Grid, Row};
