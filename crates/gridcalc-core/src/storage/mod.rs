//! Reading grid snapshots and writing results.

pub mod csv;
pub mod json;

pub use csv::{load_csv, parse_csv, write_csv};
pub use json::{EvaluateRequest, load_json, read_request, write_json};
