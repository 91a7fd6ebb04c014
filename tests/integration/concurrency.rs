//! Several writers against one repository

use serial_test::serial;
use std::thread;

use bt::store::Status;

use super::helpers::*;

#[test]
#[serial]
fn test_simultaneous_put_single_record() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    let revision = git(repo_root, &["rev-parse", "HEAD"]);

    let outcomes: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let revision = revision.clone();
                scope.spawn(move || {
                    result_store(repo_root).put(
                        &revision,
                        "build",
                        Status::Pass,
                        &[],
                        format!("writer {i}\n").as_bytes(),
                        &[],
                    )
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    for err in outcomes.iter().filter_map(|o| o.as_ref().err()) {
        assert!(err.is_benign(), "unexpected error: {err}");
    }
    assert_eq!(bt_refs(repo_root).len(), 1);

    let winner = outcomes.into_iter().find_map(Result::ok).unwrap();
    let stored = result_store(repo_root).get(&revision, "build").unwrap().unwrap();
    assert_eq!(stored.commit, winner.commit);
}

#[test]
#[serial]
fn test_racing_orchestrators_build_each_stage_once() {
    let temp_dir = init_test_repo();
    let repo_root = temp_dir.path();
    write_stage(repo_root, "a", "run: sleep 0.2; echo a\n");
    write_stage(repo_root, "b", "run: echo b\nneeds: [a]\n");
    write_stage(repo_root, "c", "run: echo c\n");
    let revision = commit_all(repo_root, "Add stages");

    let reports: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| scope.spawn(|| orchestrator(repo_root).run_once()))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().expect("cycle failed"))
            .collect()
    });

    let executed: usize = reports.iter().map(|r| r.executed_count()).sum();
    assert_eq!(executed, 3);
    assert_eq!(bt_refs(repo_root).len(), 3);
    assert_eq!(result_store(repo_root).list_records(&revision).unwrap().len(), 3);
}
