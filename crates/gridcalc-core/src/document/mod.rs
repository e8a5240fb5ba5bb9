//! Document state and the evaluation pass (UI-agnostic).

mod eval;
mod report;
mod state;
mod validate;

pub use eval::evaluate_grid;
pub use report::{Evaluation, EvaluationStats};
pub use state::Document;
pub use validate::{FormulaValidation, validate_formula};
