//! Git command runner abstraction
//!
//! Provides centralized functions for running git commands with consistent
//! error handling. Failures surface as `BtError::Store` carrying git's stderr.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;

use crate::error::{BtError, Result};

/// Extra environment for a git invocation, e.g. `GIT_INDEX_FILE`
pub type GitEnv<'a> = &'a [(&'a str, &'a Path)];

fn git_command(args: &[&str], repo_root: &Path, env: GitEnv<'_>) -> Command {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(repo_root);
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd
}

fn spawn_error(args: &[&str], e: std::io::Error) -> BtError {
    BtError::store(
        args.first().copied().unwrap_or("git"),
        format!("failed to execute git {}: {e}", args.join(" ")),
    )
}

fn check_status(args: &[&str], output: Output) -> Result<Output> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let cmd = args.first().copied().unwrap_or("git");
        return Err(BtError::store(cmd, format!("git {cmd} failed: {}", stderr.trim())));
    }
    Ok(output)
}

/// Run a git command and return the raw Output.
///
/// Use this when a non-zero exit is an expected answer rather than an error.
pub fn run_git(args: &[&str], repo_root: &Path) -> Result<Output> {
    git_command(args, repo_root, &[])
        .output()
        .map_err(|e| spawn_error(args, e))
}

/// Run a git command, check for success, and return stdout as a trimmed String.
pub fn run_git_checked(args: &[&str], repo_root: &Path) -> Result<String> {
    let output = check_status(args, run_git(args, repo_root)?)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git command, check for success, and return raw stdout bytes.
pub fn run_git_bytes(args: &[&str], repo_root: &Path) -> Result<Vec<u8>> {
    Ok(check_status(args, run_git(args, repo_root)?)?.stdout)
}

/// Run a git command with `input` on stdin and extra environment.
///
/// Stdin is written from a separate thread so a chatty command cannot
/// deadlock against a full stdout pipe.
pub fn run_git_with_input(
    args: &[&str],
    repo_root: &Path,
    env: GitEnv<'_>,
    input: &[u8],
) -> Result<String> {
    let mut child = git_command(args, repo_root, env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(args, e))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| BtError::store("git", "stdin not captured"))?;
    let input = input.to_vec();
    let writer = thread::spawn(move || stdin.write_all(&input));

    let output = child.wait_with_output().map_err(|e| spawn_error(args, e))?;
    let written = writer
        .join()
        .map_err(|_| BtError::store("git", "stdin writer panicked"))?;
    let output = check_status(args, output)?;
    written.map_err(|e| spawn_error(args, e))?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git command with extra environment, check for success, return stdout.
pub fn run_git_env(args: &[&str], repo_root: &Path, env: GitEnv<'_>) -> Result<String> {
    let output = git_command(args, repo_root, env)
        .output()
        .map_err(|e| spawn_error(args, e))?;
    let output = check_status(args, output)?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run a git command and return true if exit code is 0.
///
/// Silently swallows errors (both spawn failures and non-zero exits).
pub fn run_git_bool(args: &[&str], repo_root: &Path) -> bool {
    run_git(args, repo_root)
        .map(|output| output.status.success())
        .unwrap_or(false)
}
