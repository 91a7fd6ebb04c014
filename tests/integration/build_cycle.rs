//! End-to-end build cycles against a git repository

use serial_test::serial;
use std::fs;
use std::os::unix::fs::symlink;
use std::process::Command;

use bt::store::{ObjectStore, ResultStore, Status, TreeFile};

use super::helpers::*;

#[test]
#[serial]
fn test_run_twice_is_idempotent() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: echo a\n");
    write_stage(repo_root, "b", "run: echo b\nneeds: [a]\n");
    commit_all(repo_root, "Add stages");

    let orch = orchestrator(repo_root);
    assert_eq!(orch.run_once().unwrap().executed_count(), 2);
    let refs = bt_refs(repo_root);
    assert_eq!(refs.len(), 2);

    assert_eq!(orch.run_once().unwrap().executed_count(), 0);
    assert_eq!(bt_refs(repo_root), refs);
}

#[test]
#[serial]
fn test_commit_messages_are_exact() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "good", "run: exit 0\n");
    write_stage(repo_root, "bad", "run: exit 1\n");
    let revision = commit_all(repo_root, "Add stages");

    orchestrator(repo_root).run_once().unwrap();

    let results = result_store(repo_root);
    let good = results.get(&revision, "good").unwrap().unwrap();
    let bad = results.get(&revision, "bad").unwrap().unwrap();
    assert_eq!(commit_message(repo_root, &good.commit), "PASS bt loves you");
    assert_eq!(commit_message(repo_root, &bad.commit), "FAIL bt loves you");
    assert_eq!(
        git(repo_root, &["rev-parse", &format!("{}^1", good.commit)]),
        revision
    );
}

#[test]
#[serial]
fn test_failed_dependency_blocks_dependent() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: echo nope; exit 3\n");
    write_stage(repo_root, "b", "needs: [a]\n");
    write_stage(repo_root, "c", "needs: [b]\n");
    let revision = commit_all(repo_root, "Add stages");

    let orch = orchestrator(repo_root);
    let report = orch.run_once().unwrap();
    assert_eq!(report.executed_count(), 1);
    assert_eq!(report.failed(), 1);

    let results = result_store(repo_root);
    let a = results.get(&revision, "a").unwrap().unwrap();
    assert_eq!(a.status, Status::Fail);
    assert_eq!(a.command_output, "nope\n");
    assert!(results.get(&revision, "b").unwrap().is_none());
    assert!(results.get(&revision, "c").unwrap().is_none());

    // No implicit retry of the failure on the same revision
    assert_eq!(orch.run_once().unwrap().executed_count(), 0);
}

#[test]
#[serial]
fn test_dependency_recorded_before_dependent() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "b", "needs: [a]\nrun: echo second\n");
    write_stage(repo_root, "a", "run: echo first\n");
    let revision = commit_all(repo_root, "Add stages");

    let report = orchestrator(repo_root).run_once().unwrap();
    let order: Vec<_> = report.executed.iter().map(|r| r.stage.as_str()).collect();
    assert_eq!(order, vec!["a", "b"]);

    let results = result_store(repo_root);
    let a = results.get(&revision, "a").unwrap().unwrap();
    let b = results.get(&revision, "b").unwrap().unwrap();
    assert_eq!(b.parents, vec![revision, a.commit]);
}

#[test]
#[serial]
fn test_results_propagate_through_dependencies() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: echo blah > f\nresults: [f]\n");
    write_stage(
        repo_root,
        "b",
        "run: echo blah blah >> f\nneeds: [a]\nresults: [f]\n",
    );
    let revision = commit_all(repo_root, "Add stages");

    orchestrator(repo_root).run_once().unwrap();

    let results = result_store(repo_root);
    let b = results.get(&revision, "b").unwrap().unwrap();
    assert_eq!(b.status, Status::Pass);
    assert_eq!(
        results.result_files(&b).unwrap(),
        vec![TreeFile::new("f", "blah\nblah blah\n")]
    );
    assert_eq!(
        git(repo_root, &["cat-file", "blob", &format!("{}:results/f", b.commit)]),
        "blah\nblah blah"
    );
}

#[test]
#[serial]
fn test_failed_stage_persists_no_results() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: echo partial > f; exit 1\nresults: [f]\n");
    let revision = commit_all(repo_root, "Add stages");

    orchestrator(repo_root).run_once().unwrap();

    let record = result_store(repo_root).get(&revision, "a").unwrap().unwrap();
    assert_eq!(record.status, Status::Fail);
    assert_eq!(record.result_tree, None);
    let tree = git(repo_root, &["ls-tree", "--name-only", &record.commit]);
    assert_eq!(tree, "output");
}

#[test]
#[serial]
fn test_missing_result_is_fail() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: echo ran\nresults: [never-made]\n");
    let revision = commit_all(repo_root, "Add stages");

    orchestrator(repo_root).run_once().unwrap();

    let record = result_store(repo_root).get(&revision, "a").unwrap().unwrap();
    assert_eq!(record.status, Status::Fail);
    assert_eq!(record.command_output, "ran\n");
}

#[test]
#[serial]
fn test_output_blob_is_byte_exact() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "binary", "run: printf '\\377\\376ok'\n");
    let revision = commit_all(repo_root, "Add stages");

    orchestrator(repo_root).run_once().unwrap();

    let record = result_store(repo_root).get(&revision, "binary").unwrap().unwrap();
    let blob = Command::new("git")
        .args(["cat-file", "blob", &format!("{}:output", record.commit)])
        .current_dir(repo_root)
        .output()
        .unwrap();
    assert!(blob.status.success());
    assert_eq!(blob.stdout, b"\xff\xfeok");
}

#[test]
#[serial]
fn test_symlinks_are_not_materialized() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "look", "run: if [ -e link ]; then echo present; else echo absent; fi\n");
    symlink("README.md", repo_root.join("link")).unwrap();
    symlink("look", repo_root.join("stages").join("alias")).unwrap();
    let revision = commit_all(repo_root, "Add stages and links");

    let store = open_store(repo_root);
    let paths: Vec<_> = store
        .read_tree(&revision, "")
        .unwrap()
        .into_iter()
        .map(|f| f.path)
        .collect();
    assert!(paths.contains(&"README.md".to_string()));
    assert!(!paths.contains(&"link".to_string()));
    assert!(!paths.contains(&"stages/alias".to_string()));

    let report = orchestrator(repo_root).run_once().unwrap();
    assert_eq!(report.executed_count(), 1);
    let record = result_store(repo_root).get(&revision, "look").unwrap().unwrap();
    assert_eq!(record.command_output, "absent\n");
}

#[test]
#[serial]
fn test_new_revision_resets_eligibility() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "show", "run: cat input.txt\n");
    fs::write(repo_root.join("input.txt"), "one\n").unwrap();
    let first = commit_all(repo_root, "First");

    let orch = orchestrator(repo_root);
    orch.run_once().unwrap();
    let old_record = result_store(repo_root).get(&first, "show").unwrap().unwrap();

    fs::write(repo_root.join("input.txt"), "two\n").unwrap();
    let second = commit_all(repo_root, "Second");

    let report = orch.run_once().unwrap();
    assert_eq!(report.revision, second);
    assert_eq!(report.executed_count(), 1);

    let results = result_store(repo_root);
    assert_eq!(results.get(&first, "show").unwrap().unwrap(), old_record);
    assert_eq!(
        results.get(&second, "show").unwrap().unwrap().command_output,
        "two\n"
    );
}

#[test]
#[serial]
fn test_malformed_stage_aborts_cycle() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "fine", "run: echo ok\n");
    write_stage(repo_root, "broken", "run: [not, a, string\n");
    commit_all(repo_root, "Add stages");

    assert!(orchestrator(repo_root).run_once().is_err());
    assert!(bt_refs(repo_root).is_empty());
}

#[test]
#[serial]
fn test_record_visible_through_fresh_store() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: printf hi\n");
    let revision = commit_all(repo_root, "Add stages");

    orchestrator(repo_root).run_once().unwrap();

    let store = open_store(repo_root);
    assert_eq!(store.current_revision().unwrap(), revision);
    let record = ResultStore::new(store).get(&revision, "a").unwrap().unwrap();
    assert_eq!(record.command_output, "hi");
}
