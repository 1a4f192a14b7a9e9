//! Basic CLI E2E tests.
//!
//! Each test runs the built binary inside its own temp directory, with HOME
//! pointed there too so nothing touches the real config.

use std::fs;
use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

const CATALOG: &str = "\
id,condition,condition_code,sentence,question,correct_answer,word_count,target_word
a1,A,11,The cat sat,,,3,cat
b1,B,12,Dogs bark loudly,,,3,bark
a2,A,11,A bird sang,,,3,bird
b2,B,12,Rain fell down,,,3,fell
a3,A,11,Wind blew hard,Did the wind blow?,n,3,blew
";

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("stimuli.csv"), CATALOG).unwrap();
    let (_, _, code) = run_cli(dir.path(), &["config", "reset"]);
    assert_eq!(code, 0);
    dir
}

/// Run the CLI in `dir` and return (stdout, stderr, exit code).
fn run_cli(dir: &Path, args: &[&str]) -> (String, String, i32) {
    let config = dir.join("config.toml");
    let output = Command::new(env!("CARGO_BIN_EXE_wordpace"))
        .current_dir(dir)
        .env("HOME", dir)
        .arg("--config")
        .arg(&config)
        .args(args)
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);
    (stdout, stderr, code)
}

#[test]
fn test_config_get_set() {
    let dir = workspace();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "timing.word_hold_ms"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "450");

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "blocks.count", "2"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "blocks.count"]);
    assert_eq!(stdout.trim(), "2");
}

#[test]
fn test_config_set_rejects_invalid_value() {
    let dir = workspace();
    let (_, stderr, code) = run_cli(dir.path(), &["config", "set", "blocks.count", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("blocks.count"));
}

#[test]
fn test_config_list_is_json() {
    let dir = workspace();
    let (stdout, _, code) = run_cli(dir.path(), &["config", "list"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["triggers"]["word_onset"], 100);
}

#[test]
fn test_sequence_generate_then_show() {
    let dir = workspace();
    let (stdout, _, code) = run_cli(dir.path(), &["sequence", "generate", "p1"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("Created order for p1: 6 trials (1 questions)"));

    let (stdout, _, _) = run_cli(dir.path(), &["sequence", "generate", "p1"]);
    assert!(stdout.contains("Loaded order for p1"));

    let (stdout, _, code) = run_cli(dir.path(), &["sequence", "show", "p1", "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed.as_array().unwrap().len(), 6);
}

#[test]
fn test_sequence_show_without_order_fails() {
    let dir = workspace();
    let (_, stderr, code) = run_cli(dir.path(), &["sequence", "show", "nobody"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("no trial order"));
}

#[test]
fn test_simulated_run_then_inspect() {
    let dir = workspace();
    let (stdout, _, code) = run_cli(dir.path(), &["run", "--participant", "p1", "--simulate"]);
    assert_eq!(code, 0, "simulated run failed");
    assert!(stdout.contains("completed"));
    assert!(dir.path().join("logs_experiment/p1_data.csv").exists());
    assert!(dir.path().join("logs_experiment/p1_word_log.csv").exists());

    let (stdout, _, code) = run_cli(dir.path(), &["journal", "inspect", "p1", "--json"]);
    assert_eq!(code, 0);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["resume_point"], 6);
    assert_eq!(parsed["header_found"], true);
}

#[test]
fn test_inspect_without_data() {
    let dir = workspace();
    let (stdout, _, code) = run_cli(dir.path(), &["journal", "inspect", "p9"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("No prior session data for p9"));
}

#[test]
fn test_invalid_participant_is_rejected() {
    let dir = workspace();
    let (_, stderr, code) = run_cli(dir.path(), &["sequence", "generate", "a/b"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("participant_id"));
}
