//! Integration tests driving the gridcalc binary

use serde_json::{Value, json};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

fn run_with_stdin(args: &[&str], stdin: &str) -> (String, String, i32) {
    let mut child = Command::new("cargo")
        .arg("run")
        .arg("-q")
        .arg("--")
        // Tests must not depend on a user's ~/.config/gridcalc/config.toml.
        .arg("--no-config")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute command");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(stdin.as_bytes())
        .expect("Failed to write stdin");
    let output = child.wait_with_output().expect("Failed to wait for command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let exit_code = output.status.code().unwrap_or(-1);

    (stdout, stderr, exit_code)
}

fn run_command(args: &[&str]) -> (String, String, i32) {
    run_with_stdin(args, "")
}

fn temp_path(name: &str, ext: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "gridcalc_cli_{}_{}_{:?}.{}",
        name,
        std::process::id(),
        std::thread::current().id(),
        ext
    ))
}

struct Cleanup(Vec<PathBuf>);
impl Drop for Cleanup {
    fn drop(&mut self) {
        for path in &self.0 {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn request(data: Value, keys: &[&str]) -> String {
    let columns: Vec<Value> = keys.iter().map(|k| json!({ "key": k, "title": k })).collect();
    json!({ "data": data, "columns": columns }).to_string()
}

#[test]
fn test_evaluate_from_stdin() {
    let body = request(json!([{ "A": "5", "B": "=A1+3" }]), &["A", "B"]);
    let (stdout, _, code) = run_with_stdin(&[], &body);
    assert_eq!(code, 0);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["success"], json!(true));
    assert_eq!(result["data"][0]["B"], json!("8"));
    assert_eq!(result["message"], json!("Evaluated 1 formulas successfully"));
    assert_eq!(result["stats"]["evaluationOrder"], json!(["B1"]));
    assert!(result.get("dependency_info").is_none());
}

#[test]
fn test_cycle_exits_with_failure() {
    let body = request(json!([{ "A": "=A2" }, { "A": "=A1" }]), &["A"]);
    let (stdout, _, code) = run_with_stdin(&["-"], &body);
    assert_eq!(code, 1);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["success"], json!(false));
    assert_eq!(result["data"], json!([{ "A": "=A2" }, { "A": "=A1" }]));
    assert_eq!(result["cycle"], json!(["A2", "A1", "A2"]));
}

#[test]
fn test_dependency_info_flag() {
    let body = request(json!([{ "A": 10, "B": 20, "C": "=SUM(A1:B1)" }]), &["A", "B", "C"]);
    let (stdout, _, code) = run_with_stdin(&["--dependency-info"], &body);
    assert_eq!(code, 0);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["data"][0]["C"], json!("30"));
    assert_eq!(result["dependency_info"]["evaluationOrder"], json!(["C1"]));
    assert_eq!(result["dependency_info"]["hasCycles"], json!(false));
}

#[test]
fn test_json_numbers_keep_their_form() {
    let body = request(json!([{ "A": 5, "B": 2.5, "C": "=SUM(A1:B1)+1" }]), &["A", "B", "C"]);
    let (stdout, _, code) = run_with_stdin(&[], &body);
    assert_eq!(code, 0);
    assert!(stdout.contains(r#""A":5,"#), "{}", stdout);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["data"], json!([{ "A": 5, "B": 2.5, "C": "7.5" }]));

    let body = request(json!([{ "A": 5, "B": "=B1" }]), &["A", "B"]);
    let (stdout, _, code) = run_with_stdin(&[], &body);
    assert_eq!(code, 1);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["data"], json!([{ "A": 5, "B": "=B1" }]));
}

#[test]
fn test_whole_column_range() {
    let body = request(
        json!([{ "A": 5, "B": "=SUM(A1:A1048576)" }, { "A": "=A1*2" }]),
        &["A", "B"],
    );
    let (stdout, _, code) = run_with_stdin(&[], &body);
    assert_eq!(code, 0);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["data"][0]["B"], json!("15"));
    assert_eq!(result["stats"]["evaluationOrder"], json!(["A2", "B1"]));
}

#[test]
fn test_missing_columns_is_input_error() {
    let (stdout, stderr, code) = run_with_stdin(&[], r#"{ "data": [] }"#);
    assert_eq!(code, 2);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Missing required field: columns"));
}

#[test]
fn test_validate_formula() {
    let (stdout, _, code) = run_command(&["--validate", "=SUM(A1:A2)+b1"]);
    assert_eq!(code, 0);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result, json!({ "isValid": true, "dependencies": ["A1", "A2", "B1"] }));

    let (stdout, _, code) = run_command(&["--validate", "=SUM(A1"]);
    assert_eq!(code, 1);
    let result: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["error"], json!("Unmatched opening parenthesis"));
}

#[test]
fn test_csv_in_csv_out() {
    let input = temp_path("in", "csv");
    let output = temp_path("out", "csv");
    let _cleanup = Cleanup(vec![input.clone(), output.clone()]);
    std::fs::write(&input, "4,=AVERAGE(A1:A1)\n3,=MAX(A1:A4)\n,\n7,=A1/A3\n").unwrap();

    let (_, _, code) = run_command(&[
        input.to_str().unwrap(),
        "--format",
        "csv",
        "-o",
        output.to_str().unwrap(),
    ]);
    assert_eq!(code, 0);
    let contents = std::fs::read_to_string(&output).unwrap();
    assert_eq!(contents, "4,4\n3,7\n,\n7,#DIV/0!\n");
}

#[test]
fn test_missing_input_file() {
    let path = temp_path("missing", "json");
    let (_, stderr, code) = run_command(&[path.to_str().unwrap()]);
    assert_eq!(code, 2);
    assert!(stderr.contains("Failed to load"));
}
