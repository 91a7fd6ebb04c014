//! Shared helpers for git-backed integration tests

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use bt::git::GitObjectStore;
use bt::orchestrator::{Orchestrator, OrchestratorConfig};
use bt::store::ResultStore;

/// Run git in `repo_root` and return trimmed stdout, panicking on failure
pub fn git(repo_root: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_root)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a temporary git repository with an initial commit
pub fn init_test_repo() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let repo_root = temp_dir.path();

    git(repo_root, &["init", "-q"]);
    git(repo_root, &["config", "user.email", "test@test.com"]);
    git(repo_root, &["config", "user.name", "Test User"]);

    fs::write(repo_root.join("README.md"), "# Test Repository\n")
        .expect("Failed to write README.md");
    commit_all(repo_root, "Initial commit");

    temp_dir
}

/// Write `stages/<name>` with YAML content
pub fn write_stage(repo_root: &Path, name: &str, content: &str) {
    let dir = repo_root.join("stages");
    fs::create_dir_all(&dir).expect("Failed to create stages dir");
    fs::write(dir.join(name), content).expect("Failed to write stage file");
}

/// Write an executable generator at `stages/<name>`
pub fn write_generator(repo_root: &Path, name: &str, script: &str) {
    write_stage(repo_root, name, script);
    let path = repo_root.join("stages").join(name);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
        .expect("Failed to mark generator executable");
}

/// Commit everything in the work tree and return the new revision id
pub fn commit_all(repo_root: &Path, message: &str) -> String {
    git(repo_root, &["add", "-A"]);
    git(repo_root, &["commit", "-q", "-m", message]);
    git(repo_root, &["rev-parse", "HEAD"])
}

pub fn open_store(repo_root: &Path) -> Arc<GitObjectStore> {
    Arc::new(GitObjectStore::open(repo_root).expect("Failed to open repository"))
}

pub fn result_store(repo_root: &Path) -> ResultStore {
    ResultStore::new(open_store(repo_root))
}

pub fn orchestrator(repo_root: &Path) -> Orchestrator {
    let config = OrchestratorConfig {
        poll_interval: Duration::from_millis(50),
        ..Default::default()
    };
    Orchestrator::new(open_store(repo_root), config, Arc::new(AtomicBool::new(false)))
}

/// All refs under the bt namespace, as `<commit> <name>` lines
pub fn bt_refs(repo_root: &Path) -> Vec<String> {
    let listing = git(
        repo_root,
        &["for-each-ref", "--format=%(objectname) %(refname)", "refs/bt"],
    );
    listing.lines().map(str::to_string).collect()
}

/// Commit message of `commit`, without the trailing newline
pub fn commit_message(repo_root: &Path, commit: &str) -> String {
    git(repo_root, &["log", "-1", "--format=%B", commit])
}
