//! CSV import/export functionality

use crate::document::Document;
use crate::error::{GridcalcError, Result};
use gridcalc_engine::engine::{CellValue, Column, Row, number_to_column};
use std::io::Write;
use std::path::Path;

/// Parse CSV text into a document. Columns are keyed `A`, `B`, ... by
/// position; short lines are padded with empty cells.
pub fn parse_csv(content: &str) -> Result<Document> {
    let mut lines = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let fields = parse_csv_line(line).map_err(|message| GridcalcError::Csv {
            line: idx + 1,
            message,
        })?;
        lines.push(fields);
    }
    // A trailing blank line carries no row.
    while lines.last().is_some_and(|l| l.len() == 1 && l[0].is_empty()) {
        lines.pop();
    }
    if lines.is_empty() {
        return Err(GridcalcError::EmptyCsv);
    }

    let width = lines.iter().map(Vec::len).max().unwrap_or(0);
    let columns: Vec<Column> = (1..=width)
        .map(|n| {
            let key = number_to_column(n);
            Column::new(key.clone(), key)
        })
        .collect();

    let rows = lines
        .into_iter()
        .map(|fields| {
            let mut row = Row::new();
            for (idx, column) in columns.iter().enumerate() {
                let value = fields
                    .get(idx)
                    .map(|f| parse_csv_field(f))
                    .unwrap_or(CellValue::Empty);
                row.insert(column.key.clone(), value);
            }
            row
        })
        .collect();

    Ok(Document::new(rows, columns))
}

pub fn load_csv(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)?;
    parse_csv(&content)
}

/// Parse a single CSV line, handling quoted fields
pub(crate) fn parse_csv_line(line: &str) -> std::result::Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut field_was_quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else {
            match c {
                '"' => {
                    in_quotes = true;
                    field_was_quoted = true;
                }
                ',' => {
                    let field = std::mem::take(&mut current);
                    fields.push(if field_was_quoted {
                        field
                    } else {
                        field.trim().to_string()
                    });
                    field_was_quoted = false;
                }
                _ => current.push(c),
            }
        }
    }
    if in_quotes {
        return Err("unterminated quoted field".to_string());
    }
    fields.push(if field_was_quoted {
        current
    } else {
        current.trim().to_string()
    });
    Ok(fields)
}

/// Parse a CSV field into a cell value
/// - Empty string -> Empty
/// - Integer -> Integer, other valid number -> Number (unless it has
///   leading zeros like "007")
/// - Otherwise -> Text
pub(crate) fn parse_csv_field(field: &str) -> CellValue {
    if field.is_empty() {
        return CellValue::Empty;
    }

    // Surrounding whitespace only survives from quoted fields; keep it.
    let trimmed = field.trim();
    if field != trimmed {
        return CellValue::Text(field.to_string());
    }

    if trimmed.starts_with('0')
        && trimmed.len() > 1
        && !trimmed.starts_with("0.")
        && trimmed.chars().nth(1).is_some_and(|c| c.is_ascii_digit())
    {
        return CellValue::Text(trimmed.to_string());
    }

    if let Ok(n) = trimmed.parse::<i64>() {
        return CellValue::Integer(n);
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => CellValue::Number(n),
        _ => CellValue::Text(trimmed.to_string()),
    }
}

/// Write `rows` as CSV, one line per row in `columns` order.
pub fn write_csv<W: Write>(mut writer: W, rows: &[Row], columns: &[Column]) -> Result<()> {
    for row in rows {
        let fields: Vec<String> = columns
            .iter()
            .map(|c| {
                let value = row.get(&c.key).map(|v| v.to_string()).unwrap_or_default();
                escape_csv_field(&value)
            })
            .collect();
        writeln!(writer, "{}", fields.join(","))?;
    }
    Ok(())
}

/// Escape a field for CSV output
fn escape_csv_field(field: &str) -> String {
    // Leftover formula text must not run when the file is opened elsewhere.
    let first_non_space = field.trim_start_matches([' ', '\t']).chars().next();
    let safe_field = if matches!(first_non_space, Some('=' | '@')) {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if safe_field.contains(',')
        || safe_field.contains('"')
        || safe_field.contains('\n')
        || safe_field.contains('\r')
    {
        format!("\"{}\"", safe_field.replace('"', "\"\""))
    } else {
        safe_field
    }
}
