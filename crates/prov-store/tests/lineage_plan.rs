//! Functional tests for pipeline and experiment capture.
//!
//! These drive the store through its public entry points with an in-memory
//! revision source and check the lineage that ends up persisted.

use pretty_assertions::assert_eq;
use prov_store::{File, ProvenanceStore, StageList, StoreError};
use prov_test_utils::{
    assert_no_dangling, assert_symmetric, build_pipeline, run_experiment, run_experiment_with,
    setup_store, stages,
};
use serde_json::json;

/// Tenet: building the same pipeline twice yields one pipeline and one set of edges.
#[test]
fn pipeline_is_deduplicated() {
    let (mut store, _) = setup_store();
    let first = build_pipeline(&mut store, &[&["a.csv", "b.csv"], &["prep.py"]]);
    let second = build_pipeline(&mut store, &[&["./b.csv", "a.csv"], &["prep.py"]]);

    assert_eq!(first.id, second.id);
    assert_eq!(store.all_pipelines().unwrap().len(), 1);
    let prep = store.file_by_path("prep.py").unwrap();
    assert_eq!(prep.predecessor_ids.len(), 2);
    assert_symmetric(&store);
}

/// Tenet: two consecutive multi-file stages are rejected, and nothing is left behind.
#[test]
fn consecutive_multi_stages_are_rejected() {
    let (mut store, _) = setup_store();
    let err = store
        .build_pipeline(&stages(&[&["a", "b"], &["c", "d"], &["e"]]), None)
        .unwrap_err();

    assert!(matches!(err, StoreError::InvalidPipelineShape(_)));
    assert!(store.all_files().unwrap().is_empty());
    assert!(store.all_pipelines().unwrap().is_empty());
}

/// Tenet: fan-out followed by fan-in is a valid shape.
#[test]
fn fan_out_then_fan_in_is_accepted() {
    let (mut store, _) = setup_store();
    let pipeline = build_pipeline(
        &mut store,
        &[&["raw.csv"], &["split.py"], &["train.csv", "test.csv"], &["eval.py"]],
    );

    assert_eq!(
        pipeline.file_id_lists.iter().map(|s| s.len()).collect::<Vec<_>>(),
        vec![1, 1, 2, 1]
    );
    let mut paths = store.downstream_paths("raw.csv", "eval.py").unwrap();
    paths.sort();
    assert_eq!(
        paths,
        vec![
            vec!["raw.csv", "split.py", "test.csv", "eval.py"],
            vec!["raw.csv", "split.py", "train.csv", "eval.py"],
        ]
    );
}

/// Tenet: three untracked files referenced by one build produce exactly one commit.
#[test]
fn untracked_files_collapse_into_one_commit() {
    let (mut store, mut git) = setup_store();
    run_experiment(&mut store, &mut git, &[&["a.csv"], &["b.py"], &["c.pt"]], "first run");

    assert_eq!(git.history().len(), 1);
    assert_eq!(git.commit_count(), 1);
    let head = git.history()[0].clone();
    assert!(store.all_records().unwrap().iter().all(|r| r.commit_id == head));
}

/// Tenet: an identical run is reused; a different config makes a new experiment.
#[test]
fn experiment_reuse_policy() {
    let (mut store, mut git) = setup_store();
    let shape: &[&[&str]] = &[&["data.csv"], &["train.py"]];

    let a = run_experiment_with(&mut store, &mut git, shape, json!({"seed": 1}), json!({"lr": 0.1}));
    let b = run_experiment_with(&mut store, &mut git, shape, json!({"seed": 1}), json!({"lr": 0.1}));
    let c = run_experiment_with(&mut store, &mut git, shape, json!({"seed": 2}), json!({"lr": 0.1}));

    assert_eq!(a.id, b.id);
    assert_ne!(a.id, c.id);
    assert_eq!(store.all_experiments().unwrap().len(), 2);
    assert_eq!(store.experiments_of_pipeline(&a.pipeline_id).unwrap().len(), 2);
    assert_symmetric(&store);
}

/// Tenet: Record edges mirror File edges at the resolved revisions.
#[test]
fn record_graph_mirrors_file_graph() {
    let (mut store, mut git) = setup_store();
    run_experiment(&mut store, &mut git, &[&["a", "b"], &["c"], &["d", "e"]], "run");

    let files = store.file_graph().unwrap();
    let records = store.record_graph().unwrap();
    assert_eq!(files.arc_count(), 4);
    assert_eq!(records.arc_count(), 4);
    assert_eq!(records.len(), 5);
    assert_no_dangling(&store);
}

/// Tenet: edges added by hand obey the same symmetry and strictness rules.
#[test]
fn manual_edges_are_strict_on_removal() {
    let mut store = ProvenanceStore::in_memory();
    let a = store.get_or_create_file("a").unwrap();
    let b = store.get_or_create_file("b").unwrap();

    store.add_edge::<File>(&a.id, &b.id).unwrap();
    store.delete_edge::<File>(&a.id, &b.id).unwrap();
    let err = store.delete_edge::<File>(&a.id, &b.id).unwrap_err();
    assert!(matches!(err, StoreError::EdgeNotFound { .. }));
    assert_symmetric(&store);
}

/// Tenet: stage lists survive a JSON round trip, as the CLI passes them.
#[test]
fn stage_list_from_json() {
    let list: StageList = serde_json::from_str(r#"[["a.csv"], ["x.py", "y.py"], ["z"]]"#).unwrap();
    assert_eq!(list.sizes(), vec![1, 2, 1]);
    assert!(serde_json::from_str::<StageList>(r#"[["a"], []]"#).is_err());
}
