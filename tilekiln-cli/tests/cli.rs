//! Command-line tests for the tilekiln binary.
//!
//! Each test runs the binary with HOME pointed at a temporary directory so
//! config.ini and the log file never touch the real home directory.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn run_cli(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tilekiln"))
        .args(args)
        .env("HOME", home)
        .env_remove("RUST_LOG")
        .current_dir(home)
        .output()
        .expect("Failed to execute CLI command")
}

fn assert_success(output: &Output, context: &str) {
    if !output.status.success() {
        panic!(
            "{} failed:\nstdout: {}\nstderr: {}",
            context,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

#[test]
fn test_plan_prints_counts_per_zoom() {
    let home = TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &["plan", "--bounds", "-10,-10,10,10", "--min-zoom", "2", "--max-zoom", "3"],
    );
    assert_success(&output, "plan");

    let text = stdout(&output);
    // z2: 2x2 tiles, z3: 2x2 tiles
    assert!(text.contains("Total: 8 tiles"), "{}", text);
}

#[test]
fn test_plan_json() {
    let home = TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &["plan", "--bounds", "-180,-85,180,85", "--max-zoom", "1", "--json"],
    );
    assert_success(&output, "plan --json");

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["total_tiles"], 5);
    assert_eq!(value["ranges"].as_array().unwrap().len(), 2);
}

#[test]
fn test_plan_rejects_inverted_zoom_range() {
    let home = TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &["plan", "--bounds", "0,0,1,1", "--min-zoom", "5", "--max-zoom", "2"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));
}

#[test]
fn test_style_prints_json_document() {
    let home = TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &["style", "--style", "https://tiles.example.com/{z}/{x}/{y}.png"],
    );
    assert_success(&output, "style");

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["version"], 8);
    assert!(value["layers"].as_array().is_some_and(|l| !l.is_empty()));
}

#[test]
fn test_config_set_get_and_path() {
    let home = TempDir::new().unwrap();

    let output = run_cli(home.path(), &["config", "set", "render.concurrency", "6"]);
    assert_success(&output, "config set");

    let output = run_cli(home.path(), &["config", "get", "render.concurrency"]);
    assert_success(&output, "config get");
    assert_eq!(stdout(&output).trim(), "6");

    let output = run_cli(home.path(), &["config", "path"]);
    assert_success(&output, "config path");
    let path = stdout(&output);
    assert!(Path::new(path.trim()).starts_with(home.path()));
    assert!(Path::new(path.trim()).exists());
}

#[test]
fn test_config_set_rejects_invalid_value() {
    let home = TempDir::new().unwrap();
    let output = run_cli(home.path(), &["config", "set", "render.format", "gif"]);
    assert!(!output.status.success());

    let output = run_cli(home.path(), &["config", "get", "no.such_key"]);
    assert!(!output.status.success());
}

#[test]
fn test_generate_rejects_invalid_bounds() {
    let home = TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &["generate", "--bounds", "10,0,-10,5", "--max-zoom", "1", "--name", "bad"],
    );
    assert!(!output.status.success());
    assert!(!home.path().join("tiles").join("bad.mbtiles").exists());
}

#[test]
fn test_generate_writes_archive() {
    let home = TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &[
            "generate",
            "--bounds",
            "-180,-85,180,85",
            "--max-zoom",
            "0",
            "--name",
            "world",
            "--style",
            "missing/{z}/{x}/{y}.png",
            "--output-dir",
            "out",
            "--temp-dir",
            "work",
            "--json",
        ],
    );
    assert_success(&output, "generate");

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["number_of_tiles"], 1);
    assert!(value["error_message"].is_null());
    assert!(home.path().join("out").join("world.mbtiles").exists());
    assert!(!home.path().join("work").exists());
    assert!(home.path().join(".tilekiln").join("tilekiln.log").exists());
}

#[test]
fn test_generate_warns_when_no_layer_can_be_drawn() {
    let home = TempDir::new().unwrap();
    let output = run_cli(
        home.path(),
        &[
            "generate",
            "--bounds",
            "-180,-85,180,85",
            "--max-zoom",
            "0",
            "--name",
            "vector",
            "--style",
            "protomaps",
            "--output-dir",
            "out",
            "--temp-dir",
            "work",
        ],
    );
    assert_success(&output, "generate protomaps");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("layers not drawn: earth, water, roads"), "{}", stderr);
    assert!(home.path().join("out").join("vector.mbtiles").exists());
}
