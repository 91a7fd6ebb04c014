//! Executable stage files that generate stage definitions

use serial_test::serial;
use std::fs;

use bt::stages::load_stages;
use bt::store::Status;
use bt::BtError;

use super::helpers::*;

#[test]
#[serial]
fn test_generated_stages_are_built() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    fs::write(repo_root.join("shards.txt"), "0\n1\n").unwrap();
    write_stage(repo_root, "prepare", "run: echo ready > marker\nresults: [marker]\n");
    write_generator(
        repo_root,
        "shards",
        "#!/bin/sh\nwhile read n; do\n  echo \"shard-$n:\"\n  echo \"  run: cat marker\"\n  echo \"  needs: [prepare]\"\ndone < shards.txt\n",
    );
    let revision = commit_all(repo_root, "Add generator");

    let graph = load_stages(open_store(repo_root), &revision).unwrap();
    let names: Vec<_> = graph.stages().names().collect();
    assert_eq!(names, vec!["prepare", "shard-0", "shard-1"]);

    let report = orchestrator(repo_root).run_once().unwrap();
    assert_eq!(report.executed_count(), 3);

    let results = result_store(repo_root);
    let shard = results.get(&revision, "shard-1").unwrap().unwrap();
    assert_eq!(shard.status, Status::Pass);
    assert_eq!(shard.command_output, "ready\n");
}

#[test]
#[serial]
fn test_failing_generator_aborts_load() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "plain", "");
    write_generator(repo_root, "gen", "#!/bin/sh\necho cannot >&2\nexit 1\n");
    let revision = commit_all(repo_root, "Add generator");

    let err = load_stages(open_store(repo_root), &revision).unwrap_err();
    assert!(matches!(err, BtError::Generator { ref stage, ref output, .. }
        if stage == "gen" && output.contains("cannot")));

    assert!(orchestrator(repo_root).run_once().is_err());
    assert!(bt_refs(repo_root).is_empty());
}
