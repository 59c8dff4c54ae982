//! Functional tests for the on-disk JSON engine behind a full store.

use prov_store::{
    ExperimentRequest, JsonFileEngine, MemoryRevisionSource, ProvenanceStore, StoreError,
    StoreOptions,
};
use prov_test_utils::{assert_symmetric, stages};

fn open(path: &std::path::Path) -> ProvenanceStore<JsonFileEngine> {
    ProvenanceStore::new(JsonFileEngine::open(path).unwrap(), StoreOptions::default())
}

/// Tenet: lineage written by one process is read back intact by the next.
#[test]
fn lineage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join(".prov").join("db.json");
    let mut git = MemoryRevisionSource::new();

    let experiment = {
        let mut store = open(&db);
        let request = ExperimentRequest::new(stages(&[&["a.csv"], &["train.py"]]))
            .with_description("persisted");
        store.record_experiment(&mut git, request).unwrap()
    };

    let store = open(&db);
    assert_eq!(store.get_experiment(&experiment.id).unwrap(), experiment);
    assert_eq!(store.all_files().unwrap().len(), 2);
    assert_symmetric(&store);
}

/// Tenet: a failed operation leaves the document exactly as before.
#[test]
fn failed_build_does_not_touch_disk() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    let mut store = open(&db);
    store.get_or_create_file("keep.txt").unwrap();
    let before = std::fs::read(&db).unwrap();

    let err = store
        .build_pipeline(&stages(&[&["a", "b"], &["c", "d"]]), None)
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidPipelineShape(_)));
    assert_eq!(std::fs::read(&db).unwrap(), before);
}

/// Tenet: absolute paths inside the project root are stored relative to it.
#[test]
fn project_root_applies_to_absolute_paths() {
    let dir = tempfile::tempdir().unwrap();
    let options = StoreOptions::default().with_project_root(dir.path());
    let mut store = ProvenanceStore::new(
        JsonFileEngine::open(dir.path().join("db.json")).unwrap(),
        options,
    );

    let absolute = dir.path().join("data").join("raw.csv");
    let file = store
        .get_or_create_file(absolute.to_str().unwrap())
        .unwrap();
    assert_eq!(file.path, "data/raw.csv");
    assert!(store.get_or_create_file("/definitely/elsewhere.txt").is_err());
}

/// Tenet: when the document cannot be written, the store keeps its pre-state.
#[test]
fn unwritable_document_leaves_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("db.json");

    let mut store = open(&db);
    store.get_or_create_file("keep.txt").unwrap();
    std::fs::remove_file(&db).unwrap();
    std::fs::create_dir(&db).unwrap();
    std::fs::write(db.join("occupied"), b"x").unwrap();

    let err = store
        .build_pipeline(&stages(&[&["a"], &["b"]]), None)
        .unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));

    let files = store.all_files().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "keep.txt");
    assert!(store.all_pipelines().unwrap().is_empty());
    assert_symmetric(&store);
}
