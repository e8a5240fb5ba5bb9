//! JSON request/response handling.

use crate::document::Document;
use crate::error::{GridcalcError, Result};
use gridcalc_engine::engine::{Column, Grid};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Body of an evaluation request: `{ "data": [...], "columns": [...] }`.
#[derive(Debug, Default, Deserialize)]
pub struct EvaluateRequest {
    pub data: Option<Grid>,
    pub columns: Option<Vec<Column>>,
}

impl EvaluateRequest {
    /// Both fields are required to build a document.
    pub fn into_document(self) -> Result<Document> {
        let rows = self.data.ok_or(GridcalcError::MissingField("data"))?;
        let columns = self.columns.ok_or(GridcalcError::MissingField("columns"))?;
        Ok(Document::new(rows, columns))
    }
}

/// Parse a request from any reader (stdin, a file).
pub fn read_request<R: Read>(reader: R) -> Result<Document> {
    let request: EvaluateRequest = serde_json::from_reader(reader)?;
    request.into_document()
}

pub fn load_json(path: &Path) -> Result<Document> {
    let file = std::fs::File::open(path)?;
    read_request(std::io::BufReader::new(file))
}

/// Write `value` as JSON followed by a newline.
pub fn write_json<W: Write, T: Serialize + ?Sized>(mut writer: W, value: &T, pretty: bool) -> Result<()> {
    if pretty {
        serde_json::to_writer_pretty(&mut writer, value)?;
    } else {
        serde_json::to_writer(&mut writer, value)?;
    }
    writeln!(writer)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridcalc_engine::engine::CellValue;

    #[test]
    fn test_read_request() {
        let body = r#"{
            "data": [{ "A": 5, "B": "=A1+3", "C": null }],
            "columns": [{ "key": "A", "title": "A" }, { "key": "B", "title": "B", "width": 80 }, { "key": "C" }]
        }"#;
        let doc = read_request(body.as_bytes()).unwrap();
        assert_eq!(doc.columns.len(), 3);
        assert_eq!(doc.columns[2].title, "");
        assert_eq!(doc.rows[0]["A"], CellValue::Integer(5));
        assert_eq!(doc.rows[0]["B"], CellValue::from("=A1+3"));
        assert_eq!(doc.rows[0]["C"], CellValue::Empty);
    }

    #[test]
    fn test_missing_fields() {
        let err = read_request(r#"{ "columns": [] }"#.as_bytes()).unwrap_err();
        assert!(matches!(err, GridcalcError::MissingField("data")));
        let err = read_request(r#"{ "data": [] }"#.as_bytes()).unwrap_err();
        assert!(matches!(err, GridcalcError::MissingField("columns")));
    }

    #[test]
    fn test_malformed_json() {
        let err = read_request("{ not json".as_bytes()).unwrap_err();
        assert!(matches!(err, GridcalcError::Json(_)));
    }

    #[test]
    fn test_write_json_compact_and_pretty() {
        let mut out = Vec::new();
        write_json(&mut out, &serde_json::json!({ "a": 1 }), false).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"a\":1}\n");

        let mut out = Vec::new();
        write_json(&mut out, &serde_json::json!({ "a": 1 }), true).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\n  \"a\": 1\n}\n");
    }
}
