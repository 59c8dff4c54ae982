//! Testing utilities for the provenance workspace
//!
//! Shared fixtures and assertions.

#![allow(missing_docs)]

use prov_store::{
    Experiment, ExperimentRequest, MemoryRevisionSource, PersistenceEngine, Pipeline,
    ProvenanceStore, StageList,
};

/// Fresh in-memory store paired with a fresh revision source
pub fn setup_store() -> (ProvenanceStore, MemoryRevisionSource) {
    (ProvenanceStore::in_memory(), MemoryRevisionSource::new())
}

/// Stage list from nested path slices
pub fn stages(paths: &[&[&str]]) -> StageList {
    StageList::from_paths(paths.iter().map(|stage| stage.iter().copied())).unwrap()
}

/// Owned path list
pub fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|p| (*p).to_string()).collect()
}

pub fn build_pipeline(store: &mut ProvenanceStore, paths: &[&[&str]]) -> Pipeline {
    store.build_pipeline(&stages(paths), None).unwrap()
}

pub fn run_experiment(
    store: &mut ProvenanceStore,
    revisions: &mut MemoryRevisionSource,
    paths: &[&[&str]],
    description: &str,
) -> Experiment {
    let request = ExperimentRequest::new(stages(paths)).with_description(description);
    store.record_experiment(revisions, request).unwrap()
}

/// Same as [`run_experiment`] with explicit config and hparams
pub fn run_experiment_with(
    store: &mut ProvenanceStore,
    revisions: &mut MemoryRevisionSource,
    paths: &[&[&str]],
    config: serde_json::Value,
    hparams: serde_json::Value,
) -> Experiment {
    let request = ExperimentRequest::new(stages(paths))
        .with_description("fixture run")
        .with_config(config)
        .with_hparams(hparams);
    store.record_experiment(revisions, request).unwrap()
}

/// Panic with every asymmetric edge half if the store is not symmetric
pub fn assert_symmetric<E: PersistenceEngine>(store: &ProvenanceStore<E>) {
    let broken = store.check_symmetry().unwrap();
    assert!(broken.is_empty(), "asymmetric adjacency: {broken:#?}");
}

/// Panic if any stored id points at a missing entity
pub fn assert_no_dangling<E: PersistenceEngine>(store: &ProvenanceStore<E>) {
    let files = store.all_files().unwrap();
    let records = store.all_records().unwrap();
    let pipelines = store.all_pipelines().unwrap();
    let file_ids: Vec<_> = files.iter().map(|f| &f.id).collect();
    let record_ids: Vec<_> = records.iter().map(|r| &r.id).collect();
    let pipeline_ids: Vec<_> = pipelines.iter().map(|p| &p.id).collect();

    for file in &files {
        for id in file.predecessor_ids.iter().chain(&file.successor_ids) {
            assert!(file_ids.contains(&id), "file {} points at missing {id}", file.id);
        }
    }
    for record in &records {
        assert!(file_ids.contains(&&record.file_id), "record {} has no file", record.id);
        for id in record.predecessor_ids.iter().chain(&record.successor_ids) {
            assert!(record_ids.contains(&id), "record {} points at missing {id}", record.id);
        }
    }
    for pipeline in &pipelines {
        for id in pipeline.file_id_lists.iter().flatten() {
            assert!(file_ids.contains(&id), "pipeline {} mentions missing {id}", pipeline.id);
        }
    }
    for experiment in store.all_experiments().unwrap() {
        assert!(
            pipeline_ids.contains(&&experiment.pipeline_id),
            "experiment {} has no pipeline",
            experiment.id
        );
        for id in experiment.node_id_lists.iter().flatten() {
            assert!(record_ids.contains(&id), "experiment {} mentions missing {id}", experiment.id);
        }
    }
}
