//! Experiment builder
//!
//! Resolves a pipeline's files to the Records current in the revision
//! source, wiring Record edges that mirror the pipeline's File edges.

use crate::error::{Result, StoreError};
use crate::model::{Experiment, ExperimentId, Pipeline, Record, RecordStage, StageList};
use crate::persistence::PersistenceEngine;
use crate::revision::RevisionSource;
use crate::store::ProvenanceStore;
use chrono::Utc;
use serde_json::Value;

/// Inputs of one experiment run
#[derive(Debug, Clone)]
pub struct ExperimentRequest {
    pub description: Option<String>,
    pub stages: StageList,
    pub config: Value,
    pub hparams: Value,
    pub metrics: Value,
}

impl ExperimentRequest {
    /// Request for `stages` with empty config, hparams and metrics
    #[must_use]
    pub fn new(stages: StageList) -> Self {
        Self {
            description: None,
            stages,
            config: Value::Object(serde_json::Map::new()),
            hparams: Value::Object(serde_json::Map::new()),
            metrics: Value::Object(serde_json::Map::new()),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_hparams(mut self, hparams: Value) -> Self {
        self.hparams = hparams;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_metrics(mut self, metrics: Value) -> Self {
        self.metrics = metrics;
        self
    }
}

impl<E: PersistenceEngine> ProvenanceStore<E> {
    /// Capture one run of a pipeline
    ///
    /// Files not yet tracked are committed first, all into a single commit:
    /// the first creates it and the rest amend it. Each File is then
    /// resolved to its Record at its current revision. A run identical to a
    /// stored Experiment (same pipeline, Records, config and hparams) returns
    /// the stored one unchanged.
    ///
    /// # Errors
    /// [`StoreError::MissingRequiredField`] without a description,
    /// [`StoreError::InvalidPipelineShape`] for a bad stage list,
    /// [`StoreError::NoRevision`] if a file has no commit after tracking,
    /// or the revision source's failure unchanged
    pub fn record_experiment<R>(
        &mut self,
        revisions: &mut R,
        request: ExperimentRequest,
    ) -> Result<Experiment>
    where
        R: RevisionSource + ?Sized,
    {
        let description = request
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or(StoreError::MissingRequiredField("description"))?;

        self.atomic(|store| {
            let pipeline = store.build_pipeline(&request.stages, None)?;
            let stage_paths = store.pipeline_paths(&pipeline)?;

            let fresh = track_untracked(&mut *revisions, &stage_paths, &description)?;
            if fresh > 0 {
                tracing::info!(files = fresh, "committed untracked files");
            }
            let node_id_lists = store.resolve_records(&*revisions, &pipeline, &stage_paths)?;

            let key = Experiment::fingerprint(
                &pipeline.id,
                &node_id_lists,
                &request.config,
                &request.hparams,
            )?;
            if let Some(existing) = store.find_unique::<Experiment>(&key)? {
                tracing::info!(id = %existing.id, "identical experiment exists, reusing it");
                return Ok(existing);
            }

            let experiment = Experiment {
                id: ExperimentId::generate(),
                description,
                pipeline_id: pipeline.id,
                node_id_lists,
                config: request.config,
                hparams: request.hparams,
                metrics: request.metrics,
                created_at: Utc::now(),
            };
            for (predecessor, successor) in experiment.edges() {
                store.connect::<Record>(predecessor, successor)?;
            }
            store.insert(&experiment)?;

            tracing::info!(
                id = %experiment.id,
                pipeline = %experiment.pipeline_id,
                "recorded experiment"
            );
            Ok(experiment)
        })
    }

    fn resolve_records<R>(
        &mut self,
        revisions: &R,
        pipeline: &Pipeline,
        stage_paths: &[Vec<String>],
    ) -> Result<Vec<RecordStage>>
    where
        R: RevisionSource + ?Sized,
    {
        let mut node_id_lists = Vec::with_capacity(stage_paths.len());
        for (file_ids, paths) in pipeline.file_id_lists.iter().zip(stage_paths) {
            let mut records = RecordStage::new();
            for (file_id, path) in file_ids.iter().zip(paths) {
                let commit = revisions
                    .current_revision(path)?
                    .ok_or_else(|| StoreError::NoRevision(path.clone()))?;
                records.insert(self.get_or_create_record(file_id, &commit)?.id);
            }
            node_id_lists.push(records);
        }
        Ok(node_id_lists)
    }
}

/// Commit every untracked path, collapsing them into one commit
///
/// Returns the number of paths committed.
fn track_untracked<R>(revisions: &mut R, stage_paths: &[Vec<String>], message: &str) -> Result<usize>
where
    R: RevisionSource + ?Sized,
{
    let mut committed: Vec<&String> = Vec::new();
    for path in stage_paths.iter().flatten() {
        if committed.contains(&path) || revisions.is_tracked(path)? {
            continue;
        }
        let batch = std::slice::from_ref(path);
        let commit = if committed.is_empty() {
            revisions.stage_and_commit(batch, message)?
        } else {
            revisions.amend_last_commit(batch, Some(message))?
        };
        tracing::debug!(%path, %commit, "tracked new file");
        committed.push(path);
    }
    Ok(committed.len())
}
