//! The `bt` binary

use serial_test::serial;
use std::path::Path;
use std::process::{Command, Output};

use super::helpers::*;

fn bt(repo_root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_bt"))
        .args(args)
        .arg("-C")
        .arg(repo_root)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run bt")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
#[serial]
fn test_build_ready_results() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: echo hello\n");
    write_stage(repo_root, "b", "needs: [a]\n");
    let revision = commit_all(repo_root, "Add stages");

    let ready = bt(repo_root, &["ready"]);
    assert!(ready.status.success());
    assert_eq!(stdout(&ready), "a\n");

    let build = bt(repo_root, &["build"]);
    assert!(build.status.success());
    let lines = stdout(&build);
    assert!(lines.contains("PASS"));
    assert!(lines.contains(" a "));

    let ready = bt(repo_root, &["ready"]);
    assert!(ready.status.success());
    assert_eq!(stdout(&ready), "");

    let results = bt(repo_root, &["results"]);
    assert!(results.status.success());
    let text = stdout(&results);
    assert_eq!(text.lines().count(), 1);
    let json: serde_json::Value = serde_json::from_str(text.trim()).unwrap();
    let stages = &json[&revision];
    assert_eq!(stages["a"]["status"], "PASS");
    assert_eq!(stages["a"]["output"], "hello\n");
    assert_eq!(stages["b"]["status"], "PASS");
}

#[test]
#[serial]
fn test_results_shows_unbuilt_stages_as_empty() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "");
    let first = commit_all(repo_root, "Add stage");
    bt(repo_root, &["build"]);
    std::fs::write(repo_root.join("new.txt"), "x\n").unwrap();
    let second = commit_all(repo_root, "Change");

    let results = bt(repo_root, &["results", "-n", "2"]);
    assert!(results.status.success());
    let lines: Vec<serde_json::Value> = stdout(&results)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0][&second]["a"], serde_json::json!({}));
    assert_eq!(lines[1][&first]["a"]["status"], "PASS");
}

#[test]
#[serial]
fn test_cycle_exits_nonzero() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "needs: [b]\n");
    write_stage(repo_root, "b", "needs: [a]\n");
    commit_all(repo_root, "Add cycle");

    let build = bt(repo_root, &["build"]);
    assert!(!build.status.success());
    assert!(String::from_utf8_lossy(&build.stderr).contains("Circular dependency"));

    let ready = bt(repo_root, &["ready"]);
    assert!(!ready.status.success());
}

#[test]
#[serial]
fn test_nothing_to_do_is_success() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();

    let build = bt(repo_root, &["build"]);
    assert!(build.status.success());
    assert_eq!(stdout(&build), "");
}
