//! Cascade deletion
//!
//! Removing an entity also removes whatever would otherwise point at a
//! missing entity: Pipelines that mention a deleted File, Experiments that
//! mention a deleted Record or were run from a deleted Pipeline, and the
//! edges a deleted Pipeline or Experiment wired. An edge still wired by a
//! surviving Pipeline or Experiment is kept. Neighbouring Files and
//! Records are never deleted.

use crate::edges::EdgeMode;
use crate::error::Result;
use crate::model::{
    Experiment, ExperimentId, File, FileId, Pipeline, PipelineId, Record, RecordId,
};
use crate::persistence::PersistenceEngine;
use crate::store::ProvenanceStore;
use std::collections::HashSet;
use std::ops::AddAssign;

/// Count of entities removed by one cascade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Removed {
    pub files: usize,
    pub records: usize,
    pub pipelines: usize,
    pub experiments: usize,
}

impl Removed {
    #[inline]
    #[must_use]
    pub fn total(&self) -> usize {
        self.files + self.records + self.pipelines + self.experiments
    }
}

impl AddAssign for Removed {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.records += other.records;
        self.pipelines += other.pipelines;
        self.experiments += other.experiments;
    }
}

impl<E: PersistenceEngine> ProvenanceStore<E> {
    /// Delete a File, its Records, and every Pipeline that mentions it
    ///
    /// # Errors
    /// [`crate::StoreError::NotFound`] if the File does not exist
    pub fn delete_file(&mut self, id: &FileId) -> Result<Removed> {
        self.atomic(|store| {
            let _: File = store.require(id)?;
            let mut removed = Removed::default();

            for pipeline in store.all_pipelines()? {
                if pipeline.mentions(id) {
                    removed += store.remove_pipeline(&pipeline)?;
                }
            }
            for record in store.records_of_file(id)? {
                removed += store.remove_record(&record.id)?;
            }
            store.detach::<File>(id)?;
            store.erase::<File>(id)?;
            removed.files += 1;

            tracing::info!(%id, ?removed, "deleted file");
            Ok(removed)
        })
    }

    /// Delete a Record and every Experiment that mentions it
    ///
    /// # Errors
    /// [`crate::StoreError::NotFound`] if the Record does not exist
    pub fn delete_record(&mut self, id: &RecordId) -> Result<Removed> {
        self.atomic(|store| {
            let _: Record = store.require(id)?;
            let removed = store.remove_record(id)?;
            tracing::info!(%id, ?removed, "deleted record");
            Ok(removed)
        })
    }

    /// Delete a Pipeline, its Experiments, and the File edges only it wired
    ///
    /// # Errors
    /// [`crate::StoreError::NotFound`] if the Pipeline does not exist
    pub fn delete_pipeline(&mut self, id: &PipelineId) -> Result<Removed> {
        self.atomic(|store| {
            let pipeline: Pipeline = store.require(id)?;
            let removed = store.remove_pipeline(&pipeline)?;
            tracing::info!(%id, ?removed, "deleted pipeline");
            Ok(removed)
        })
    }

    /// Delete an Experiment and the Record edges only it wired
    ///
    /// # Errors
    /// [`crate::StoreError::NotFound`] if the Experiment does not exist
    pub fn delete_experiment(&mut self, id: &ExperimentId) -> Result<Removed> {
        self.atomic(|store| {
            let experiment: Experiment = store.require(id)?;
            let removed = store.remove_experiment(&experiment)?;
            tracing::info!(%id, "deleted experiment");
            Ok(removed)
        })
    }

    fn remove_record(&mut self, id: &RecordId) -> Result<Removed> {
        let mut removed = Removed::default();
        for experiment in self.all_experiments()? {
            if experiment.mentions(id) {
                removed += self.remove_experiment(&experiment)?;
            }
        }
        self.detach::<Record>(id)?;
        if self.erase::<Record>(id)? {
            removed.records += 1;
        }
        Ok(removed)
    }

    fn remove_pipeline(&mut self, pipeline: &Pipeline) -> Result<Removed> {
        let mut removed = Removed::default();
        for experiment in self.experiments_of_pipeline(&pipeline.id)? {
            removed += self.remove_experiment(&experiment)?;
        }

        let kept: HashSet<(FileId, FileId)> = self
            .all_pipelines()?
            .iter()
            .filter(|other| other.id != pipeline.id)
            .flat_map(|other| other.edges().map(|(p, s)| (p.clone(), s.clone())))
            .collect();
        for (predecessor, successor) in pipeline.edges() {
            if !kept.contains(&(predecessor.clone(), successor.clone())) {
                self.disconnect::<File>(predecessor, successor, EdgeMode::Lenient)?;
            }
        }

        if self.erase::<Pipeline>(&pipeline.id)? {
            removed.pipelines += 1;
        }
        Ok(removed)
    }

    fn remove_experiment(&mut self, experiment: &Experiment) -> Result<Removed> {
        let kept: HashSet<(RecordId, RecordId)> = self
            .all_experiments()?
            .iter()
            .filter(|other| other.id != experiment.id)
            .flat_map(|other| other.edges().map(|(p, s)| (p.clone(), s.clone())))
            .collect();
        for (predecessor, successor) in experiment.edges() {
            if !kept.contains(&(predecessor.clone(), successor.clone())) {
                self.disconnect::<Record>(predecessor, successor, EdgeMode::Lenient)?;
            }
        }

        let mut removed = Removed::default();
        if self.erase::<Experiment>(&experiment.id)? {
            removed.experiments += 1;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::ExperimentRequest;
    use crate::model::StageList;
    use crate::revision::MemoryRevisionSource;

    fn stages(paths: &[&[&str]]) -> StageList {
        StageList::from_paths(paths.iter().map(|s| s.iter().copied())).unwrap()
    }

    #[test]
    fn missing_entities_are_not_found() {
        let mut store = ProvenanceStore::in_memory();
        assert!(store.delete_file(&FileId::new("x")).unwrap_err().is_not_found());
        assert!(store.delete_record(&RecordId::new("x")).unwrap_err().is_not_found());
        assert!(store.delete_pipeline(&PipelineId::new("x")).unwrap_err().is_not_found());
        assert!(store
            .delete_experiment(&ExperimentId::new("x"))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn deleting_pipeline_unwires_its_edges() {
        let mut store = ProvenanceStore::in_memory();
        let pipeline = store.build_pipeline(&stages(&[&["a"], &["b"]]), None).unwrap();
        let removed = store.delete_pipeline(&pipeline.id).unwrap();

        assert_eq!(removed.pipelines, 1);
        for file in store.all_files().unwrap() {
            assert!(file.predecessor_ids.is_empty() && file.successor_ids.is_empty());
        }
        assert_eq!(store.all_files().unwrap().len(), 2);
    }

    #[test]
    fn shared_edge_survives_one_pipeline() {
        let mut store = ProvenanceStore::in_memory();
        let short = store.build_pipeline(&stages(&[&["a"], &["b"]]), None).unwrap();
        store
            .build_pipeline(&stages(&[&["a"], &["b"], &["c"]]), None)
            .unwrap();

        store.delete_pipeline(&short.id).unwrap();
        let a = store.file_by_path("a").unwrap();
        let b = store.file_by_path("b").unwrap();
        assert!(store.has_edge::<File>(&a.id, &b.id).unwrap());
    }

    #[test]
    fn deleting_record_removes_experiments() {
        let mut store = ProvenanceStore::in_memory();
        let mut git = MemoryRevisionSource::new();
        let experiment = store
            .record_experiment(
                &mut git,
                ExperimentRequest::new(stages(&[&["a"], &["b"]])).with_description("run"),
            )
            .unwrap();
        let record = experiment.node_id_lists[0].iter().next().unwrap().clone();

        let removed = store.delete_record(&record).unwrap();
        assert_eq!((removed.records, removed.experiments), (1, 1));
        assert!(store.all_experiments().unwrap().is_empty());
        for r in store.all_records().unwrap() {
            assert!(r.predecessor_ids.is_empty() && r.successor_ids.is_empty());
        }
        assert_eq!(store.all_pipelines().unwrap().len(), 1);
    }

    #[test]
    fn totals_add_up() {
        let mut total = Removed::default();
        total += Removed {
            files: 1,
            records: 2,
            pipelines: 0,
            experiments: 3,
        };
        assert_eq!(total.total(), 6);
    }
}
