//! Built-in spreadsheet functions.
//!
//! Conventions:
//! - Spreadsheet-facing names are ALL CAPS (`SUM`, `AVERAGE`, ...).
//! - The set is closed: names resolve through [`Function::from_name`] and
//!   anything else is `#NAME?`.
//! - `SUM` and `AVERAGE` take a range, a comma list of cells/numbers, a single
//!   cell or a single number. `MIN`, `MAX` and `COUNT` take a range only, and
//!   its start column must be in the schema.
//! - Ranges are walked as written: a reversed range (`B2:A1`) covers no cells,
//!   and `AVERAGE` over it is `#DIV/0!`.

use log::debug;
use regex::Regex;
use std::sync::OnceLock;

use crate::engine::{ErrorToken, SheetView, column_to_number, number_to_column};

/// Largest rectangle a function will walk (after dropping rows past the grid).
const MAX_FUNCTION_RANGE_CELLS: usize = 1_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    Sum,
    Average,
    Min,
    Max,
    Count,
}

/// A range argument with its corners in the order written.
#[derive(Clone, Debug, PartialEq)]
struct FunctionRange {
    start_letter: String,
    start_col: usize,
    end_col: usize,
    start_row: usize,
    end_row: usize,
}

impl FunctionRange {
    fn parse(args: &str) -> Option<FunctionRange> {
        let caps = range_arg_re().captures(args.trim())?;
        Some(FunctionRange {
            start_letter: caps[1].to_string(),
            start_col: column_to_number(&caps[1])?,
            start_row: caps[2].parse().ok()?,
            end_col: column_to_number(&caps[3])?,
            end_row: caps[4].parse().ok()?,
        })
    }

    /// Width times height from the corners as written, zero or negative when
    /// the range is reversed. None on overflow.
    fn signed_cell_count(&self) -> Option<i128> {
        let width = self.end_col as i128 - self.start_col as i128 + 1;
        let height = self.end_row as i128 - self.start_row as i128 + 1;
        width.checked_mul(height)
    }

    /// Cells inside the grid, row-major, as (column letter, 1-based row).
    /// Rows past the grid are dropped; a reversed axis yields nothing.
    fn cells(&self, view: &SheetView<'_>) -> Result<Vec<(String, usize)>, ErrorToken> {
        let first_row = self.start_row.max(1);
        let last_row = self.end_row.min(view.row_count());
        if last_row < first_row || self.end_col < self.start_col {
            return Ok(Vec::new());
        }
        let rows = last_row - first_row + 1;
        let width = self.end_col - self.start_col + 1;
        match rows.checked_mul(width) {
            Some(n) if n <= MAX_FUNCTION_RANGE_CELLS => {}
            _ => return Err(ErrorToken::Error),
        }
        let columns: Vec<String> = (self.start_col..=self.end_col).map(number_to_column).collect();
        let mut cells = Vec::with_capacity(rows * width);
        for row in first_row..=last_row {
            for letter in &columns {
                cells.push((letter.clone(), row));
            }
        }
        Ok(cells)
    }
}

/// A parsed `SUM`/`AVERAGE` argument.
#[derive(Debug, PartialEq)]
enum Args {
    Range(FunctionRange),
    List(Vec<String>),
    Cell(String, String),
    Number(f64),
}

impl Function {
    pub const ALL: [Function; 5] = [
        Function::Sum,
        Function::Average,
        Function::Min,
        Function::Max,
        Function::Count,
    ];

    pub fn from_name(name: &str) -> Option<Function> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Function::Sum => "SUM",
            Function::Average => "AVERAGE",
            Function::Min => "MIN",
            Function::Max => "MAX",
            Function::Count => "COUNT",
        }
    }

    /// Apply the function to its raw argument text.
    pub fn call(self, args: &str, view: &SheetView<'_>) -> Result<f64, ErrorToken> {
        debug!("{}({})", self.name(), args);
        match self {
            Function::Sum => sum(&parse_args(args)?, view),
            Function::Average => average(&parse_args(args)?, view),
            Function::Min => {
                let values = range_values(args, view)?;
                Ok(values.into_iter().reduce(f64::min).unwrap_or(0.0))
            }
            Function::Max => {
                let values = range_values(args, view)?;
                Ok(values.into_iter().reduce(f64::max).unwrap_or(0.0))
            }
            Function::Count => {
                let range = checked_range_arg(args, view)?;
                let mut count = 0usize;
                for (letter, row) in range.cells(view)? {
                    if view.raw(&letter, row).is_some_and(|v| !v.is_blank()) {
                        count += 1;
                    }
                }
                Ok(count as f64)
            }
        }
    }
}

fn range_arg_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Z]+)([0-9]+):([A-Z]+)([0-9]+)$").expect("range argument regex must compile")
    })
}

pub(crate) fn cell_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([A-Z]+)([0-9]+)$").expect("cell token regex must compile"))
}

fn parse_args(args: &str) -> Result<Args, ErrorToken> {
    let args = args.trim();
    if range_arg_re().is_match(args) {
        return range_arg(args).map(Args::Range);
    }
    if args.contains(',') {
        return Ok(Args::List(args.split(',').map(|s| s.trim().to_string()).collect()));
    }
    if let Some(caps) = cell_token_re().captures(args) {
        return Ok(Args::Cell(caps[1].to_string(), caps[2].to_string()));
    }
    args.parse::<f64>().map(Args::Number).map_err(|_| ErrorToken::Error)
}

fn range_arg(args: &str) -> Result<FunctionRange, ErrorToken> {
    FunctionRange::parse(args).ok_or(ErrorToken::Error)
}

/// Range argument for `MIN`/`MAX`/`COUNT`: the start column must exist.
fn checked_range_arg(args: &str, view: &SheetView<'_>) -> Result<FunctionRange, ErrorToken> {
    let range = range_arg(args)?;
    if !view.has_column(&range.start_letter) {
        debug!("Range starts in unknown column {}", range.start_letter);
        return Err(ErrorToken::Error);
    }
    Ok(range)
}

fn range_values(args: &str, view: &SheetView<'_>) -> Result<Vec<f64>, ErrorToken> {
    let range = checked_range_arg(args, view)?;
    Ok(range
        .cells(view)?
        .into_iter()
        .map(|(letter, row)| view.number(&letter, row))
        .collect())
}

fn list_item(item: &str, view: &SheetView<'_>) -> Result<f64, ErrorToken> {
    if let Some(caps) = cell_token_re().captures(item) {
        return Ok(view.number_at(&caps[1], &caps[2]));
    }
    item.parse::<f64>().map_err(|_| {
        debug!("Invalid cell reference or number: {}", item);
        ErrorToken::Error
    })
}

fn sum(args: &Args, view: &SheetView<'_>) -> Result<f64, ErrorToken> {
    match args {
        Args::Range(range) => Ok(range
            .cells(view)?
            .into_iter()
            .map(|(letter, row)| view.number(&letter, row))
            .sum()),
        Args::List(items) => items.iter().map(|item| list_item(item, view)).sum(),
        Args::Cell(letter, row) => Ok(view.number_at(letter, row)),
        Args::Number(n) => Ok(*n),
    }
}

fn average(args: &Args, view: &SheetView<'_>) -> Result<f64, ErrorToken> {
    let total = sum(args, view)?;
    let count: i128 = match args {
        Args::Range(range) => range.signed_cell_count().ok_or(ErrorToken::Error)?,
        Args::List(items) => items.len() as i128,
        Args::Cell(..) | Args::Number(_) => 1,
    };
    if count <= 0 {
        return Err(ErrorToken::DivZero);
    }
    Ok(total / count as f64)
}
