//! Dependency extraction from formula strings.
//!
//! Parses formula text to find all cell references (e.g., `A1`, `B2:C5`)
//! that the formula reads. This is used to build the dependency graph
//! for evaluation ordering and cycle detection.
//!
//! Handles:
//! - Range references: `A1:B5` expanded to every cell of the rectangle
//! - Simple cell references: `A1`, `B2`
//!
//! Also hosts the shallow syntax check (balanced parentheses).

use log::{debug, warn};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

use super::cell_ref::{CellCoordinate, number_to_column};

const MAX_DEPENDENCY_RANGE_CELLS: usize = 1_000_000;

/// Why a formula failed the syntax check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error("Empty formula")]
    Empty,

    #[error("Unmatched closing parenthesis")]
    UnmatchedClosing,

    #[error("Unmatched opening parenthesis")]
    UnmatchedOpening,
}

/// Inclusive rectangle of a range reference, normalized so that
/// `first <= last` on both axes regardless of which corner came first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RangeBounds {
    pub first_col: usize,
    pub last_col: usize,
    pub first_row: usize,
    pub last_row: usize,
}

impl RangeBounds {
    pub fn from_corners(start: &CellCoordinate, end: &CellCoordinate) -> Option<RangeBounds> {
        let start_col = start.column_number()?;
        let end_col = end.column_number()?;
        Some(RangeBounds {
            first_col: start_col.min(end_col),
            last_col: start_col.max(end_col),
            first_row: start.row.min(end.row),
            last_row: start.row.max(end.row),
        })
    }

    pub fn width(&self) -> usize {
        self.last_col - self.first_col + 1
    }

    pub fn height(&self) -> usize {
        self.last_row - self.first_row + 1
    }

    /// Number of cells in the rectangle, None on overflow.
    pub fn cell_count(&self) -> Option<usize> {
        self.width().checked_mul(self.height())
    }

    /// Overlap with `other`, None when the two do not meet.
    pub fn intersect(&self, other: &RangeBounds) -> Option<RangeBounds> {
        let bounds = RangeBounds {
            first_col: self.first_col.max(other.first_col),
            last_col: self.last_col.min(other.last_col),
            first_row: self.first_row.max(other.first_row),
            last_row: self.last_row.min(other.last_row),
        };
        (bounds.first_col <= bounds.last_col && bounds.first_row <= bounds.last_row)
            .then_some(bounds)
    }

    /// Column letters of the rectangle, left to right.
    pub fn columns(&self) -> Vec<String> {
        (self.first_col..=self.last_col).map(number_to_column).collect()
    }

    /// Every coordinate of the rectangle, row-major.
    pub fn coordinates(&self) -> Vec<CellCoordinate> {
        let columns = self.columns();
        let mut out = Vec::new();
        for row in self.first_row..=self.last_row {
            for col in &columns {
                out.push(CellCoordinate::new(col.clone(), row));
            }
        }
        out
    }
}

/// Parse a bare range like "A1:B5" into its normalized rectangle.
pub fn parse_range(range: &str) -> Option<RangeBounds> {
    let (start, end) = range.split_once(':')?;
    let start = CellCoordinate::from_str(start)?;
    let end = CellCoordinate::from_str(end)?;
    RangeBounds::from_corners(&start, &end)
}

/// Extract all cell references from a formula as dependencies.
///
/// A leading `=` is ignored and matching is case-insensitive. Ranges are
/// expanded, then removed from the text before single references are
/// scanned so that range endpoints are not counted twice. A range of more
/// than 1,000,000 cells is skipped; use [`extract_dependencies_within`] when
/// the grid extent is known.
pub fn extract_dependencies(formula: &str) -> HashSet<CellCoordinate> {
    extract_dependencies_within(formula, None)
}

/// Like [`extract_dependencies`], but each range is first clipped to `area`
/// and only the overlap is expanded. Clipped ranges are never skipped, so a
/// whole-column range such as `A1:A1048576` still yields every cell of the
/// grid it covers. Single references are not clipped.
pub fn extract_dependencies_within(
    formula: &str,
    area: Option<&RangeBounds>,
) -> HashSet<CellCoordinate> {
    let body = formula.strip_prefix('=').unwrap_or(formula).to_ascii_uppercase();
    let mut deps = HashSet::new();

    let range_re = range_ref_re();
    for caps in range_re.captures_iter(&body) {
        let corners = (
            CellCoordinate::from_str(&format!("{}{}", &caps[1], &caps[2])),
            CellCoordinate::from_str(&format!("{}{}", &caps[3], &caps[4])),
        );
        let (Some(start), Some(end)) = corners else {
            continue;
        };
        let Some(bounds) = RangeBounds::from_corners(&start, &end) else {
            continue;
        };
        match area {
            Some(area) => {
                if let Some(clipped) = bounds.intersect(area) {
                    deps.extend(clipped.coordinates());
                }
            }
            None => match bounds.cell_count() {
                Some(n) if n <= MAX_DEPENDENCY_RANGE_CELLS => deps.extend(bounds.coordinates()),
                _ => warn!("Skipping oversized range {}:{}", start, end),
            },
        }
    }

    let without_ranges = range_re.replace_all(&body, "");
    for caps in cell_ref_re().captures_iter(&without_ranges) {
        if let Some(cr) = CellCoordinate::from_str(&format!("{}{}", &caps[1], &caps[2])) {
            deps.insert(cr);
        }
    }

    debug!("Extracted {} dependencies from formula: {}", deps.len(), body);
    deps
}

/// Shallow syntax check: non-empty body and balanced parentheses.
/// Function names, arity and operator placement are not checked.
pub fn validate_syntax(formula: &str) -> Result<(), SyntaxError> {
    let body = formula.strip_prefix('=').unwrap_or(formula);
    if body.trim().is_empty() {
        return Err(SyntaxError::Empty);
    }

    let mut depth = 0usize;
    for ch in body.chars() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or(SyntaxError::UnmatchedClosing)?;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err(SyntaxError::UnmatchedOpening);
    }
    Ok(())
}

fn range_ref_re() -> &'static Regex {
    static RANGE_RE: OnceLock<Regex> = OnceLock::new();
    RANGE_RE.get_or_init(|| {
        Regex::new(r"\b([A-Z]+)([0-9]+):([A-Z]+)([0-9]+)\b")
            .expect("dependency range regex must compile")
    })
}

fn cell_ref_re() -> &'static Regex {
    static CELL_RE: OnceLock<Regex> = OnceLock::new();
    CELL_RE.get_or_init(|| {
        Regex::new(r"\b([A-Z]+)([0-9]+)\b").expect("dependency cell reference regex must compile")
    })
}
