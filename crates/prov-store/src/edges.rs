//! Edge maintenance
//!
//! A stored edge A -> B is the pair `B ∈ A.successor_ids` and
//! `A ∈ B.predecessor_ids`. Every function here writes both halves in the
//! same transaction so the two sets never disagree.

use crate::error::{Result, StoreError};
use crate::model::{Entity, File, FileId, Record, RecordId};
use crate::persistence::PersistenceEngine;
use crate::store::ProvenanceStore;
use std::collections::BTreeSet;

/// Entity with persisted predecessor and successor sets
pub trait Adjacent: Entity {
    fn predecessors(&self) -> &BTreeSet<Self::Id>;
    fn successors(&self) -> &BTreeSet<Self::Id>;
    fn predecessors_mut(&mut self) -> &mut BTreeSet<Self::Id>;
    fn successors_mut(&mut self) -> &mut BTreeSet<Self::Id>;
}

impl Adjacent for File {
    fn predecessors(&self) -> &BTreeSet<FileId> {
        &self.predecessor_ids
    }
    fn successors(&self) -> &BTreeSet<FileId> {
        &self.successor_ids
    }
    fn predecessors_mut(&mut self) -> &mut BTreeSet<FileId> {
        &mut self.predecessor_ids
    }
    fn successors_mut(&mut self) -> &mut BTreeSet<FileId> {
        &mut self.successor_ids
    }
}

impl Adjacent for Record {
    fn predecessors(&self) -> &BTreeSet<RecordId> {
        &self.predecessor_ids
    }
    fn successors(&self) -> &BTreeSet<RecordId> {
        &self.successor_ids
    }
    fn predecessors_mut(&mut self) -> &mut BTreeSet<RecordId> {
        &mut self.predecessor_ids
    }
    fn successors_mut(&mut self) -> &mut BTreeSet<RecordId> {
        &mut self.successor_ids
    }
}

/// How edge removal treats an absent edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMode {
    /// Absent edge or endpoint is an error
    Strict,
    /// Absent halves are skipped; used by cascades
    Lenient,
}

impl<E: PersistenceEngine> ProvenanceStore<E> {
    /// Add `predecessor -> successor`; re-adding an edge is a no-op
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if either endpoint is missing
    pub fn add_edge<A: Adjacent>(&mut self, predecessor: &A::Id, successor: &A::Id) -> Result<()> {
        self.atomic(|store| store.connect::<A>(predecessor, successor))
    }

    /// Remove `predecessor -> successor`
    ///
    /// # Errors
    /// [`StoreError::EdgeNotFound`] if the edge is absent,
    /// [`StoreError::NotFound`] if either endpoint is missing
    pub fn delete_edge<A: Adjacent>(
        &mut self,
        predecessor: &A::Id,
        successor: &A::Id,
    ) -> Result<()> {
        self.atomic(|store| {
            store
                .disconnect::<A>(predecessor, successor, EdgeMode::Strict)
                .map(|_| ())
        })
    }

    /// Whether `predecessor -> successor` is stored
    ///
    /// # Errors
    /// Persistence or decoding failure
    pub fn has_edge<A: Adjacent>(&self, predecessor: &A::Id, successor: &A::Id) -> Result<bool> {
        Ok(self
            .load::<A>(predecessor)?
            .is_some_and(|node| node.successors().contains(successor)))
    }

    pub(crate) fn connect<A: Adjacent>(&mut self, predecessor: &A::Id, successor: &A::Id) -> Result<()> {
        let mut head: A = self.require(predecessor)?;
        if predecessor == successor {
            head.successors_mut().insert(successor.clone());
            head.predecessors_mut().insert(predecessor.clone());
            return self.save(&head);
        }

        let mut tail: A = self.require(successor)?;
        head.successors_mut().insert(successor.clone());
        tail.predecessors_mut().insert(predecessor.clone());
        self.save(&head)?;
        self.save(&tail)?;
        tracing::trace!(kind = %A::KIND, %predecessor, %successor, "edge added");
        Ok(())
    }

    /// Remove whatever halves of the edge exist; returns whether any did
    pub(crate) fn disconnect<A: Adjacent>(
        &mut self,
        predecessor: &A::Id,
        successor: &A::Id,
        mode: EdgeMode,
    ) -> Result<bool> {
        let head: Option<A> = self.load(predecessor)?;
        let tail: Option<A> = if predecessor == successor {
            head.clone()
        } else {
            self.load(successor)?
        };

        if mode == EdgeMode::Strict {
            if head.is_none() {
                return Err(StoreError::not_found(A::KIND, predecessor.as_ref()));
            }
            if tail.is_none() {
                return Err(StoreError::not_found(A::KIND, successor.as_ref()));
            }
        }

        let forward = head
            .as_ref()
            .is_some_and(|node| node.successors().contains(successor));
        let backward = tail
            .as_ref()
            .is_some_and(|node| node.predecessors().contains(predecessor));

        if mode == EdgeMode::Strict && !(forward && backward) {
            return Err(StoreError::EdgeNotFound {
                kind: A::KIND,
                predecessor: predecessor.to_string(),
                successor: successor.to_string(),
            });
        }

        if predecessor == successor {
            if let Some(mut node) = head.filter(|_| forward || backward) {
                node.successors_mut().remove(successor);
                node.predecessors_mut().remove(predecessor);
                self.save(&node)?;
            }
        } else {
            if let Some(mut node) = head.filter(|_| forward) {
                node.successors_mut().remove(successor);
                self.save(&node)?;
            }
            if let Some(mut node) = tail.filter(|_| backward) {
                node.predecessors_mut().remove(predecessor);
                self.save(&node)?;
            }
        }

        if forward || backward {
            tracing::trace!(kind = %A::KIND, %predecessor, %successor, "edge removed");
        }
        Ok(forward || backward)
    }

    /// Drop every edge touching `id`, on both sides
    pub(crate) fn detach<A: Adjacent>(&mut self, id: &A::Id) -> Result<()> {
        let Some(node) = self.load::<A>(id)? else {
            return Ok(());
        };
        for predecessor in node.predecessors() {
            self.disconnect::<A>(predecessor, id, EdgeMode::Lenient)?;
        }
        for successor in node.successors() {
            self.disconnect::<A>(id, successor, EdgeMode::Lenient)?;
        }
        Ok(())
    }
}
