//! Functional tests for cascade deletion.
//!
//! Every test ends with the store symmetric and free of dangling ids.

use prov_store::{File, RevisionSource};
use prov_test_utils::{
    assert_no_dangling, assert_symmetric, build_pipeline, run_experiment, setup_store,
};

/// Tenet: deleting a File leaves no Pipeline, Experiment or Record referencing it.
#[test]
fn deleting_file_removes_everything_that_mentions_it() {
    let (mut store, mut git) = setup_store();
    let experiment = run_experiment(&mut store, &mut git, &[&["a"], &["b"], &["c"]], "run");
    let b = store.file_by_path("b").unwrap();

    let removed = store.delete_file(&b.id).unwrap();

    assert_eq!(removed.files, 1);
    assert_eq!(removed.pipelines, 1);
    assert_eq!(removed.experiments, 1);
    assert_eq!(removed.records, 1);
    assert!(store.get_experiment(&experiment.id).unwrap_err().is_not_found());
    assert!(store.all_pipelines().unwrap().is_empty());
    assert!(store.records_of_file(&b.id).unwrap().is_empty());

    for name in ["a", "c"] {
        let file = store.file_by_path(name).unwrap();
        assert!(file.predecessor_ids.is_empty(), "{name}");
        assert!(file.successor_ids.is_empty(), "{name}");
    }
    for record in store.all_records().unwrap() {
        assert!(record.predecessor_ids.is_empty() && record.successor_ids.is_empty());
    }
    assert_symmetric(&store);
    assert_no_dangling(&store);
}

/// Tenet: pipelines that never mention the deleted File are untouched.
#[test]
fn unrelated_pipelines_survive() {
    let (mut store, _) = setup_store();
    build_pipeline(&mut store, &[&["a"], &["b"]]);
    let other = build_pipeline(&mut store, &[&["x"], &["y"]]);
    let a = store.file_by_path("a").unwrap();

    store.delete_file(&a.id).unwrap();

    assert_eq!(store.all_pipelines().unwrap(), vec![other]);
    let x = store.file_by_path("x").unwrap();
    let y = store.file_by_path("y").unwrap();
    assert!(store.has_edge::<File>(&x.id, &y.id).unwrap());
    assert_no_dangling(&store);
}

/// Tenet: an edge wired by two pipelines is removed only with the last of them.
#[test]
fn shared_edges_outlive_one_owner() {
    let (mut store, _) = setup_store();
    let p1 = build_pipeline(&mut store, &[&["a"], &["b"], &["c"]]);
    let p2 = build_pipeline(&mut store, &[&["a"], &["b"], &["d"]]);
    let a = store.file_by_path("a").unwrap();
    let b = store.file_by_path("b").unwrap();
    let c = store.file_by_path("c").unwrap();

    store.delete_pipeline(&p1.id).unwrap();
    assert!(store.has_edge::<File>(&a.id, &b.id).unwrap());
    assert!(!store.has_edge::<File>(&b.id, &c.id).unwrap());

    store.delete_pipeline(&p2.id).unwrap();
    assert!(!store.has_edge::<File>(&a.id, &b.id).unwrap());
    assert_symmetric(&store);
}

/// Tenet: a cascade that meets an already-removed edge carries on.
#[test]
fn cascade_tolerates_edges_removed_by_hand() {
    let (mut store, _) = setup_store();
    let pipeline = build_pipeline(&mut store, &[&["a"], &["b"], &["c"]]);
    let a = store.file_by_path("a").unwrap();
    let b = store.file_by_path("b").unwrap();
    store.delete_edge::<File>(&a.id, &b.id).unwrap();

    let removed = store.delete_pipeline(&pipeline.id).unwrap();
    assert_eq!(removed.pipelines, 1);
    assert_symmetric(&store);
}

/// Tenet: deleting a pipeline takes its experiments and their Record edges along.
#[test]
fn deleting_pipeline_removes_experiments() {
    let (mut store, mut git) = setup_store();
    let first = run_experiment(&mut store, &mut git, &[&["a"], &["b"]], "one");
    let pipeline = store.get_pipeline(&first.pipeline_id).unwrap();
    git.touch("b");
    git.stage_and_commit(&["b".to_string()], "edit").unwrap();
    run_experiment(&mut store, &mut git, &[&["a"], &["b"]], "two");

    let removed = store.delete_pipeline(&pipeline.id).unwrap();

    assert_eq!(removed.experiments, 2);
    assert!(store.all_experiments().unwrap().is_empty());
    assert_eq!(store.all_records().unwrap().len(), 3);
    for record in store.all_records().unwrap() {
        assert!(record.successor_ids.is_empty() && record.predecessor_ids.is_empty());
    }
    assert_no_dangling(&store);
}

/// Tenet: deleting one experiment keeps Record edges another experiment still uses.
#[test]
fn deleting_experiment_keeps_shared_record_edges() {
    let (mut store, mut git) = setup_store();
    let one = prov_test_utils::run_experiment_with(
        &mut store,
        &mut git,
        &[&["a"], &["b"]],
        serde_json::json!({"seed": 1}),
        serde_json::json!({}),
    );
    let two = prov_test_utils::run_experiment_with(
        &mut store,
        &mut git,
        &[&["a"], &["b"]],
        serde_json::json!({"seed": 2}),
        serde_json::json!({}),
    );
    assert_eq!(one.node_id_lists, two.node_id_lists);

    store.delete_experiment(&one.id).unwrap();
    let ra = one.node_id_lists[0].iter().next().unwrap();
    let rb = one.node_id_lists[1].iter().next().unwrap();
    assert!(store.has_edge::<prov_store::Record>(ra, rb).unwrap());

    store.delete_experiment(&two.id).unwrap();
    assert!(!store.has_edge::<prov_store::Record>(ra, rb).unwrap());
    assert_symmetric(&store);
}
