//! Readiness queries against recorded state

use serial_test::serial;

use bt::readiness::{evaluate, ready_stages, Readiness};
use bt::stages::load_stages;
use bt::store::Status;

use super::helpers::*;

#[test]
#[serial]
fn test_ready_follows_records() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "lint", "");
    write_stage(repo_root, "build", "");
    write_stage(repo_root, "test", "needs: [build]\n");
    let revision = commit_all(repo_root, "Add stages");

    let store = open_store(repo_root);
    let graph = load_stages(store.clone(), &revision).unwrap();
    let results = result_store(repo_root);

    // File-name order is declaration order
    assert_eq!(
        ready_stages(&results, &revision, &graph).unwrap(),
        vec!["build", "lint"]
    );

    results
        .put(&revision, "build", Status::Pass, &[], b"", &[])
        .unwrap();
    assert_eq!(
        ready_stages(&results, &revision, &graph).unwrap(),
        vec!["lint", "test"]
    );

    orchestrator(repo_root).run_once().unwrap();
    assert!(ready_stages(&results, &revision, &graph).unwrap().is_empty());
}

#[test]
#[serial]
fn test_blocked_stages_never_ready() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: false\n");
    write_stage(repo_root, "b", "needs: [a]\n");
    let revision = commit_all(repo_root, "Add stages");

    orchestrator(repo_root).run_once().unwrap();

    let graph = load_stages(open_store(repo_root), &revision).unwrap();
    let results = result_store(repo_root);
    assert!(ready_stages(&results, &revision, &graph).unwrap().is_empty());

    let states = evaluate(&results, &revision, &graph).unwrap();
    assert_eq!(states["a"], Readiness::Recorded(Status::Fail));
    assert_eq!(states["b"], Readiness::Blocked);
}
