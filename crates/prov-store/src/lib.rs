//! Provenance Store
//!
//! Tracks lineage between versioned artifacts:
//!
//! - **File**: a project-relative path, independent of revision
//! - **Record**: a File as of one commit
//! - **Pipeline**: ordered stages of Files, wired stage to stage
//! - **Experiment**: one run of a Pipeline, resolved to Records
//!
//! Files and Records carry `predecessor_ids`/`successor_ids` that are kept
//! symmetric by every operation. Storage goes through a
//! [`PersistenceEngine`]; commit state comes from a [`RevisionSource`].
//!
//! # Example
//!
//! ```rust
//! use prov_store::{ExperimentRequest, MemoryRevisionSource, ProvenanceStore, StageList};
//!
//! let mut store = ProvenanceStore::in_memory();
//! let mut revisions = MemoryRevisionSource::new();
//!
//! let stages = StageList::from_paths([vec!["data.csv"], vec!["train.py"], vec!["model.pt"]])?;
//! let request = ExperimentRequest::new(stages).with_description("baseline");
//! let experiment = store.record_experiment(&mut revisions, request)?;
//!
//! assert_eq!(experiment.node_id_lists.len(), 3);
//! assert_eq!(revisions.commit_count(), 1);
//! # Ok::<(), prov_store::StoreError>(())
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod analysis;
mod cascade;
mod edges;
mod error;
mod experiment;
mod id;
mod model;
mod path;
mod pipeline;
mod revision;
mod store;
mod watch;

pub mod persistence;

pub use analysis::Asymmetry;
pub use cascade::Removed;
pub use edges::{Adjacent, EdgeMode};
pub use error::{Result, StoreError};
pub use experiment::ExperimentRequest;
pub use id::{fingerprint, generate as generate_id, EntityKind};
pub use model::{
    Entity, EntityId, Experiment, ExperimentId, File, FileId, FileStage, Pipeline, PipelineId,
    Record, RecordId, RecordStage, Stage, StageList,
};
pub use path::normalize_path;
pub use persistence::{JsonFileEngine, MemoryEngine, PersistenceEngine, PersistenceError};
pub use pipeline::validate_shape;
pub use revision::{MemoryRevisionSource, RevisionError, RevisionResult, RevisionSource};
pub use store::{ProvenanceStore, StoreOptions};
pub use watch::WatchOutcome;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
