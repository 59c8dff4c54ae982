//! Entity model
//!
//! Files, commit-bound Records, Pipelines (ordered stages of Files) and
//! Experiments (a Pipeline resolved to Records). Set-valued fields are
//! `BTreeSet`s so their serialized form is always sorted and duplicate-free.

use crate::error::{Result, StoreError};
use crate::id::{self, EntityKind};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Debug, Display, Formatter};
use std::hash::Hash;

/// Bounds shared by every typed entity identifier
pub trait EntityId:
    Debug + Clone + Ord + Hash + Display + AsRef<str> + Serialize + DeserializeOwned
{
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident => $kind:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an existing identifier
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generate a fresh identifier
            #[inline]
            #[must_use]
            pub fn generate() -> Self {
                Self(id::generate($kind))
            }

            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl EntityId for $name {}
    };
}

entity_id!(
    /// Identifier of a [`File`]
    FileId => EntityKind::File
);
entity_id!(
    /// Identifier of a [`Record`]
    RecordId => EntityKind::Record
);
entity_id!(
    /// Identifier of a [`Pipeline`]
    PipelineId => EntityKind::Pipeline
);
entity_id!(
    /// Identifier of an [`Experiment`]
    ExperimentId => EntityKind::Experiment
);

/// A persisted entity
pub trait Entity: Debug + Clone + Serialize + DeserializeOwned {
    /// Typed identifier
    type Id: EntityId;

    /// Table this entity lives in
    const KIND: EntityKind;

    fn id(&self) -> &Self::Id;

    /// Value of the entity's unique index, if it has one
    ///
    /// # Errors
    /// Returns error if the key cannot be serialized
    fn unique_key(&self) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Ordered stage of File ids, canonical form
pub type FileStage = BTreeSet<FileId>;

/// Ordered stage of Record ids, canonical form
pub type RecordStage = BTreeSet<RecordId>;

/// A tracked artifact at the path level, independent of revision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    pub id: FileId,
    /// Normalized, project-relative path (unique)
    pub path: String,
    #[serde(default)]
    pub predecessor_ids: BTreeSet<FileId>,
    #[serde(default)]
    pub successor_ids: BTreeSet<FileId>,
}

impl File {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            id: FileId::generate(),
            path: path.into(),
            predecessor_ids: BTreeSet::new(),
            successor_ids: BTreeSet::new(),
        }
    }
}

impl Entity for File {
    type Id = FileId;
    const KIND: EntityKind = EntityKind::File;

    fn id(&self) -> &FileId {
        &self.id
    }

    fn unique_key(&self) -> Result<Option<String>> {
        Ok(Some(self.path.clone()))
    }
}

/// A File as of one specific commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub file_id: FileId,
    pub commit_id: String,
    #[serde(default)]
    pub predecessor_ids: BTreeSet<RecordId>,
    #[serde(default)]
    pub successor_ids: BTreeSet<RecordId>,
}

impl Record {
    #[must_use]
    pub fn new(file_id: FileId, commit_id: impl Into<String>) -> Self {
        Self {
            id: RecordId::generate(),
            file_id,
            commit_id: commit_id.into(),
            predecessor_ids: BTreeSet::new(),
            successor_ids: BTreeSet::new(),
        }
    }

    /// Unique key of the `(file_id, commit_id)` pair
    #[must_use]
    pub fn revision_key(file_id: &FileId, commit_id: &str) -> String {
        format!("{file_id}@{commit_id}")
    }
}

impl Entity for Record {
    type Id = RecordId;
    const KIND: EntityKind = EntityKind::Record;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn unique_key(&self) -> Result<Option<String>> {
        Ok(Some(Self::revision_key(&self.file_id, &self.commit_id)))
    }
}

/// Ordered list of File stages describing a fixed processing shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: PipelineId,
    #[serde(default)]
    pub description: Option<String>,
    pub file_id_lists: Vec<FileStage>,
}

impl Pipeline {
    /// Canonical key of a stage list, used for de-duplication
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn canonical_key(file_id_lists: &[FileStage]) -> Result<String> {
        Ok(serde_json::to_string(file_id_lists)?)
    }

    /// Whether any stage contains `file_id`
    #[must_use]
    pub fn mentions(&self, file_id: &FileId) -> bool {
        self.file_id_lists.iter().any(|stage| stage.contains(file_id))
    }

    /// Every `(predecessor, successor)` File pair wired between consecutive stages
    pub fn edges(&self) -> impl Iterator<Item = (&FileId, &FileId)> + '_ {
        stage_edges(&self.file_id_lists)
    }
}

impl Entity for Pipeline {
    type Id = PipelineId;
    const KIND: EntityKind = EntityKind::Pipeline;

    fn id(&self) -> &PipelineId {
        &self.id
    }

    fn unique_key(&self) -> Result<Option<String>> {
        Self::canonical_key(&self.file_id_lists).map(Some)
    }
}

/// One concrete run of a Pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: ExperimentId,
    pub description: String,
    pub pipeline_id: PipelineId,
    /// Records per stage, positionally parallel to the pipeline's stages
    pub node_id_lists: Vec<RecordStage>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub hparams: serde_json::Value,
    #[serde(default)]
    pub metrics: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Experiment {
    /// Fingerprint identifying equivalent runs
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn fingerprint(
        pipeline_id: &PipelineId,
        node_id_lists: &[RecordStage],
        config: &serde_json::Value,
        hparams: &serde_json::Value,
    ) -> Result<String> {
        Ok(id::fingerprint(&(pipeline_id, node_id_lists, config, hparams))?)
    }

    /// Whether any stage contains `record_id`
    #[must_use]
    pub fn mentions(&self, record_id: &RecordId) -> bool {
        self.node_id_lists.iter().any(|stage| stage.contains(record_id))
    }

    /// Every `(predecessor, successor)` Record pair wired between consecutive stages
    pub fn edges(&self) -> impl Iterator<Item = (&RecordId, &RecordId)> + '_ {
        stage_edges(&self.node_id_lists)
    }
}

impl Entity for Experiment {
    type Id = ExperimentId;
    const KIND: EntityKind = EntityKind::Experiment;

    fn id(&self) -> &ExperimentId {
        &self.id
    }

    fn unique_key(&self) -> Result<Option<String>> {
        Self::fingerprint(
            &self.pipeline_id,
            &self.node_id_lists,
            &self.config,
            &self.hparams,
        )
        .map(Some)
    }
}

/// Full bipartite wiring between every pair of consecutive stages
fn stage_edges<I: Ord>(stages: &[BTreeSet<I>]) -> impl Iterator<Item = (&I, &I)> + '_ {
    stages.windows(2).flat_map(|pair| {
        let (predecessors, successors) = (&pair[0], &pair[1]);
        predecessors
            .iter()
            .flat_map(move |p| successors.iter().map(move |s| (p, s)))
    })
}

/// One position of a stage list: a non-empty set of file paths
///
/// Paths keep their first-seen order; repeats are dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct Stage(Vec<String>);

impl Stage {
    /// Create a stage from one or more paths
    ///
    /// # Errors
    /// [`StoreError::InvalidPipelineShape`] if no path is given
    pub fn new<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for path in paths {
            let path = path.into();
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        if unique.is_empty() {
            return Err(StoreError::InvalidPipelineShape(
                "a stage needs at least one file".to_string(),
            ));
        }
        Ok(Self(unique))
    }

    /// Stage holding a single path
    #[must_use]
    pub fn single(path: impl Into<String>) -> Self {
        Self(vec![path.into()])
    }

    #[inline]
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.0
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<String>> for Stage {
    type Error = StoreError;

    fn try_from(paths: Vec<String>) -> Result<Self> {
        Self::new(paths)
    }
}

impl From<Stage> for Vec<String> {
    fn from(stage: Stage) -> Self {
        stage.0
    }
}

/// Non-empty ordered list of stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Stage>", into = "Vec<Stage>")]
pub struct StageList(Vec<Stage>);

impl StageList {
    /// # Errors
    /// [`StoreError::InvalidPipelineShape`] if `stages` is empty
    pub fn new(stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(StoreError::InvalidPipelineShape(
                "a pipeline needs at least one stage".to_string(),
            ));
        }
        Ok(Self(stages))
    }

    /// Build from nested path lists, e.g. `[["a", "b"], ["c"]]`
    ///
    /// # Errors
    /// [`StoreError::InvalidPipelineShape`] for an empty list or stage
    pub fn from_paths<I, J, S>(stages: I) -> Result<Self>
    where
        I: IntoIterator<Item = J>,
        J: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stages = stages
            .into_iter()
            .map(Stage::new)
            .collect::<Result<Vec<_>>>()?;
        Self::new(stages)
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Stage> {
        self.0.iter()
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Stage sizes in order
    #[must_use]
    pub fn sizes(&self) -> Vec<usize> {
        self.0.iter().map(Stage::len).collect()
    }
}

impl TryFrom<Vec<Stage>> for StageList {
    type Error = StoreError;

    fn try_from(stages: Vec<Stage>) -> Result<Self> {
        Self::new(stages)
    }
}

impl From<StageList> for Vec<Stage> {
    fn from(list: StageList) -> Self {
        list.0
    }
}
