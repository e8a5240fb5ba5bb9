//! Grid snapshot data structures.
//!
//! - [`CellValue`] - Raw content of a cell as supplied by the caller
//! - [`Column`] - One entry of the caller's column schema
//! - [`Row`] / [`Grid`] - A grid snapshot: ordered rows of `column key -> value`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The content of one grid cell.
///
/// Serialized untagged, so JSON numbers, strings, booleans and `null` map
/// directly onto the variants. Integral JSON numbers land in `Integer` and
/// are written back without a fractional part.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Integer(i64),
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
}

impl CellValue {
    /// The formula text if this cell holds one (a string starting with `=`).
    pub fn formula(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if s.starts_with('=') => Some(s),
            _ => None,
        }
    }

    /// Numeric coercion used wherever a formula reads a cell.
    ///
    /// Numbers are used as-is. Strings keep only digits, `.` and `-` and are
    /// parsed as a float; anything unparseable becomes 0. Other values are 0.
    pub fn as_number(&self) -> f64 {
        match self {
            CellValue::Integer(n) => *n as f64,
            CellValue::Number(n) => *n,
            CellValue::Text(s) => {
                let cleaned: String = s
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                    .collect();
                cleaned.parse::<f64>().unwrap_or(0.0)
            }
            CellValue::Bool(_) | CellValue::Empty => 0.0,
        }
    }

    /// Whether the cell counts as non-empty for `COUNT`.
    pub fn is_blank(&self) -> bool {
        self.to_string().trim().is_empty()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Integer(n) => write!(f, "{}", n),
            CellValue::Number(n) => write!(f, "{}", super::format_number(*n)),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<i64> for CellValue {
    fn from(n: i64) -> Self {
        CellValue::Integer(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

/// A column of the caller's schema. Formula column letters must equal a key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub key: String,
    #[serde(default)]
    pub title: String,
}

impl Column {
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Column {
        Column {
            key: key.into(),
            title: title.into(),
        }
    }
}

/// One grid row: column key -> raw value.
pub type Row = BTreeMap<String, CellValue>;

/// A grid snapshot, rows in order (row index 0 is formula row 1).
pub type Grid = Vec<Row>;

/// Look up the schema key a formula column letter refers to.
///
/// Letters and keys coincide, so this is a linear identity lookup that fails
/// for letters the schema does not declare.
pub fn letter_to_column_key<'a>(letter: &str, columns: &'a [Column]) -> Option<&'a str> {
    columns
        .iter()
        .find(|c| c.key == letter)
        .map(|c| c.key.as_str())
}
