//! Cell coordinate parsing and formatting.
//!
//! Provides conversion between spreadsheet-style cell references
//! (e.g., "A1", "B2", "AA100") and a column key plus 1-based row.
//! Column keys double as column letters: `A=1 … Z=26, AA=27 …`.
//!
//! # Examples
//!
//! ```
//! use gridcalc_engine::engine::CellCoordinate;
//!
//! let cell = CellCoordinate::from_str("b3").unwrap();
//! assert_eq!(cell.column, "B");
//! assert_eq!(cell.row, 3);
//! assert_eq!(cell.to_string(), "B3");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// A reference to a cell by column key and 1-based row.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct CellCoordinate {
    pub column: String,
    pub row: usize,
}

impl CellCoordinate {
    pub fn new(column: impl Into<String>, row: usize) -> CellCoordinate {
        CellCoordinate {
            column: column.into(),
            row,
        }
    }

    /// Parse a cell reference from spreadsheet notation (e.g., "A1", "b2", "AA10").
    /// The column is uppercased. Returns None for row 0 or malformed input.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(name: &str) -> Option<CellCoordinate> {
        Self::parse_a1(name)
    }

    fn parse_a1(name: &str) -> Option<CellCoordinate> {
        let caps = a1_re().captures(name)?;
        let column = caps["letters"].to_ascii_uppercase();
        let row = caps["numbers"].parse::<usize>().ok()?;
        if row == 0 {
            return None;
        }
        // Reject columns whose number does not fit in usize.
        column_to_number(&column)?;
        Some(CellCoordinate::new(column, row))
    }

    /// 0-based index of this row in grid storage.
    pub fn row_index(&self) -> usize {
        self.row - 1
    }

    /// Column number of this coordinate's key (A=1).
    pub fn column_number(&self) -> Option<usize> {
        column_to_number(&self.column)
    }
}

fn a1_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?<letters>[A-Za-z]+)(?<numbers>[0-9]+)$")
            .expect("A1 reference regex must compile")
    })
}

/// Convert column letters to a number (A -> 1, Z -> 26, AA -> 27).
/// Returns None for empty input, non-letters, or overflow.
pub fn column_to_number(letters: &str) -> Option<usize> {
    if letters.is_empty() {
        return None;
    }
    let mut acc = 0usize;
    for c in letters.bytes() {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() - b'A') as usize + 1;
        acc = acc.checked_mul(26)?.checked_add(digit)?;
    }
    Some(acc)
}

/// Convert a column number to letters (1 -> A, 26 -> Z, 27 -> AA).
/// Zero has no letters and yields an empty string.
pub fn number_to_column(number: usize) -> String {
    let mut result = String::new();
    let mut n = number as u128;
    while n > 0 {
        n -= 1;
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    result
}

impl std::str::FromStr for CellCoordinate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_a1(s).ok_or_else(|| format!("Invalid cell reference: {}", s))
    }
}

impl fmt::Display for CellCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column, self.row)
    }
}

/// Render a path of coordinates as `A1 -> B2 -> A1`.
pub fn render_path(path: &[CellCoordinate]) -> String {
    path.iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
