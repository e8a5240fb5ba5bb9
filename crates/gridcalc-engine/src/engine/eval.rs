//! Formula evaluation.
//!
//! The grammar is deliberately small. The stripped, uppercased expression is
//! tried against each form in turn and the first match wins:
//!
//! 1. `NAME(ARGS)` - a built-in function call at the start of the expression;
//!    anything after the closing parenthesis is ignored
//! 2. `A1` - a bare cell reference
//! 3. `X op Y` - one binary operator (`+ - * /`) between two operands, each a
//!    cell reference or a number; there is no precedence and no chaining
//! 4. a numeric literal
//!
//! Every failure is an [`ErrorToken`] in the return value.

use log::debug;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

use super::cell::{CellValue, Column, Row, letter_to_column_key};
use crate::builtins::{Function, cell_token_re};

/// Sentinel results a formula evaluates to instead of a number.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorToken {
    #[error("#ERROR!")]
    Error,

    #[error("#NAME?")]
    Name,

    #[error("#DIV/0!")]
    DivZero,
}

impl ErrorToken {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorToken::Error => "#ERROR!",
            ErrorToken::Name => "#NAME?",
            ErrorToken::DivZero => "#DIV/0!",
        }
    }

    /// Recognize a rendered token.
    pub fn parse(s: &str) -> Option<ErrorToken> {
        [ErrorToken::Error, ErrorToken::Name, ErrorToken::DivZero]
            .into_iter()
            .find(|t| t.as_str() == s)
    }
}

/// Read-only access to a grid snapshot by column letter and 1-based row.
#[derive(Clone, Copy)]
pub struct SheetView<'a> {
    grid: &'a [Row],
    columns: &'a [Column],
}

impl<'a> SheetView<'a> {
    pub fn new(grid: &'a [Row], columns: &'a [Column]) -> Self {
        SheetView { grid, columns }
    }

    pub fn row_count(&self) -> usize {
        self.grid.len()
    }

    /// Whether `letter` names a column of the schema.
    pub fn has_column(&self, letter: &str) -> bool {
        letter_to_column_key(letter, self.columns).is_some()
    }

    /// Raw value at `letter`/`row`, None if the row, column or cell is absent.
    pub fn raw(&self, letter: &str, row: usize) -> Option<&'a CellValue> {
        let row_data = self.grid.get(row.checked_sub(1)?)?;
        let key = letter_to_column_key(letter, self.columns)?;
        row_data.get(key)
    }

    /// Numeric value at `letter`/`row`; anything absent reads as 0.
    pub fn number(&self, letter: &str, row: usize) -> f64 {
        self.raw(letter, row).map(CellValue::as_number).unwrap_or(0.0)
    }

    /// Like [`Self::number`] with the row still in text form, as matched.
    pub fn number_at(&self, letter: &str, row: &str) -> f64 {
        row.parse::<usize>()
            .map(|r| self.number(letter, r))
            .unwrap_or(0.0)
    }
}

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Z]+)\(([^)]+)\)").expect("function call regex must compile")
    })
}

/// Evaluate `formula` for the cell at `row_index` (0-based) / `column_key`.
pub fn evaluate(
    formula: &str,
    row_index: usize,
    column_key: &str,
    grid: &[Row],
    columns: &[Column],
) -> Result<f64, ErrorToken> {
    let view = SheetView::new(grid, columns);
    let expression = formula.strip_prefix('=').unwrap_or(formula).to_uppercase();
    let expression = expression.trim();
    debug!("Evaluating {}-{}: {}", row_index, column_key, expression);
    evaluate_expression(expression, &view)
}

/// Evaluate an already stripped and uppercased expression.
pub fn evaluate_expression(expression: &str, view: &SheetView<'_>) -> Result<f64, ErrorToken> {
    if expression.is_empty() {
        return Err(ErrorToken::Error);
    }

    if let Some(caps) = function_re().captures(expression) {
        let function = Function::from_name(&caps[1]).ok_or(ErrorToken::Name)?;
        return function.call(&caps[2], view);
    }

    if let Some(caps) = cell_token_re().captures(expression) {
        return Ok(view.number_at(&caps[1], &caps[2]));
    }

    if let Some((lhs, op, rhs)) = split_binary(expression)
        && let (Some(left), Some(right)) = (operand(lhs, view), operand(rhs, view))
    {
        return arithmetic(left, op, right);
    }

    expression.parse::<f64>().map_err(|_| ErrorToken::Error)
}

/// Split at the first operator past the first character, e.g. `A1+3` or
/// `2*-4`. Both sides must be non-empty.
fn split_binary(expr: &str) -> Option<(&str, char, &str)> {
    let (i, op) = expr
        .char_indices()
        .skip(1)
        .find(|(_, ch)| matches!(ch, '+' | '-' | '*' | '/'))?;
    let lhs = expr[..i].trim();
    let rhs = expr[i + op.len_utf8()..].trim();
    if lhs.is_empty() || rhs.is_empty() {
        return None;
    }
    Some((lhs, op, rhs))
}

/// A cell reference or a number; anything else does not resolve.
fn operand(token: &str, view: &SheetView<'_>) -> Option<f64> {
    if let Some(caps) = cell_token_re().captures(token) {
        return Some(view.number_at(&caps[1], &caps[2]));
    }
    token.parse::<f64>().ok()
}

fn arithmetic(left: f64, op: char, right: f64) -> Result<f64, ErrorToken> {
    match op {
        '+' => Ok(left + right),
        '-' => Ok(left - right),
        '*' => Ok(left * right),
        '/' if right == 0.0 => Err(ErrorToken::DivZero),
        '/' => Ok(left / right),
        _ => Err(ErrorToken::Error),
    }
}
