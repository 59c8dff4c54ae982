//! Pipeline builder

use crate::error::{Result, StoreError};
use crate::model::{File, FileStage, Pipeline, PipelineId, StageList};
use crate::persistence::PersistenceEngine;
use crate::store::ProvenanceStore;

/// Check a list of stage sizes against the pipeline shape rules
///
/// Every stage must be non-empty and no two consecutive stages may both
/// hold more than one file.
///
/// # Errors
/// [`StoreError::InvalidPipelineShape`] naming the offending stage
pub fn validate_shape(stage_sizes: &[usize]) -> Result<()> {
    if stage_sizes.is_empty() {
        return Err(StoreError::InvalidPipelineShape(
            "a pipeline needs at least one stage".to_string(),
        ));
    }
    if let Some(position) = stage_sizes.iter().position(|&n| n == 0) {
        return Err(StoreError::InvalidPipelineShape(format!(
            "stage {position} is empty"
        )));
    }
    if let Some(position) = stage_sizes.windows(2).position(|w| w[0] > 1 && w[1] > 1) {
        return Err(StoreError::InvalidPipelineShape(format!(
            "stages {position} and {} both hold more than one file",
            position + 1
        )));
    }
    Ok(())
}

impl<E: PersistenceEngine> ProvenanceStore<E> {
    /// Resolve each stage's paths to sorted File id sets, registering new files
    pub(crate) fn resolve_stages(&mut self, stages: &StageList) -> Result<Vec<FileStage>> {
        let mut file_id_lists = Vec::with_capacity(stages.len());
        for stage in stages.iter() {
            let mut ids = FileStage::new();
            for path in stage.paths() {
                ids.insert(self.get_or_create_file(path)?.id);
            }
            file_id_lists.push(ids);
        }
        Ok(file_id_lists)
    }

    /// Pipeline with the given stages, building it if it does not exist
    ///
    /// An existing pipeline with the same canonical stages is returned as is.
    /// Otherwise the shape is validated, consecutive stages are fully wired
    /// File to File and the new pipeline is stored. `description` is only
    /// used for a new pipeline.
    ///
    /// # Errors
    /// [`StoreError::InvalidPipelineShape`] or [`StoreError::InvalidPath`]
    pub fn build_pipeline(
        &mut self,
        stages: &StageList,
        description: Option<&str>,
    ) -> Result<Pipeline> {
        self.atomic(|store| {
            let file_id_lists = store.resolve_stages(stages)?;
            let key = Pipeline::canonical_key(&file_id_lists)?;
            if let Some(existing) = store.find_unique::<Pipeline>(&key)? {
                tracing::debug!(id = %existing.id, "pipeline already exists");
                return Ok(existing);
            }

            let sizes: Vec<usize> = file_id_lists.iter().map(FileStage::len).collect();
            validate_shape(&sizes)?;

            let pipeline = Pipeline {
                id: PipelineId::generate(),
                description: description.map(str::to_string),
                file_id_lists,
            };
            for (predecessor, successor) in pipeline.edges() {
                store.connect::<File>(predecessor, successor)?;
            }
            store.insert(&pipeline)?;

            tracing::info!(id = %pipeline.id, stages = pipeline.file_id_lists.len(), "built pipeline");
            Ok(pipeline)
        })
    }

    /// Find the pipeline for `stages` without creating anything
    ///
    /// # Errors
    /// Persistence or path failure
    pub fn find_pipeline(&self, stages: &StageList) -> Result<Option<Pipeline>> {
        let mut file_id_lists = Vec::with_capacity(stages.len());
        for stage in stages.iter() {
            let mut ids = FileStage::new();
            for path in stage.paths() {
                match self.find_file(path)? {
                    Some(file) => {
                        ids.insert(file.id);
                    }
                    None => return Ok(None),
                }
            }
            file_id_lists.push(ids);
        }
        self.find_unique(&Pipeline::canonical_key(&file_id_lists)?)
    }
}
