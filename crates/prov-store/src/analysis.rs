//! Diagnostics over the persisted adjacency

use crate::edges::Adjacent;
use crate::error::Result;
use crate::id::EntityKind;
use crate::persistence::PersistenceEngine;
use crate::store::ProvenanceStore;
use prov_graph::DirectedGraph;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// One half of an edge whose mirror half is missing
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Asymmetry {
    pub kind: EntityKind,
    pub predecessor: String,
    pub successor: String,
}

impl<E: PersistenceEngine> ProvenanceStore<E> {
    /// File-level adjacency as a [`DirectedGraph`] keyed by File id
    ///
    /// # Errors
    /// Persistence or decoding failure
    pub fn file_graph(&self) -> Result<DirectedGraph> {
        Ok(adjacency_graph(&self.all_files()?))
    }

    /// Record-level adjacency as a [`DirectedGraph`] keyed by Record id
    ///
    /// # Errors
    /// Persistence or decoding failure
    pub fn record_graph(&self) -> Result<DirectedGraph> {
        Ok(adjacency_graph(&self.all_records()?))
    }

    /// Every simple path of file paths leading from `from` to `to`
    ///
    /// # Errors
    /// [`crate::StoreError::NotFound`] if either path is not registered
    pub fn downstream_paths(&self, from: &str, to: &str) -> Result<Vec<Vec<String>>> {
        let start = self.file_by_path(from)?;
        let end = self.file_by_path(to)?;
        let files = self.all_files()?;
        let names: HashMap<String, String> = files
            .iter()
            .map(|f| (f.id.to_string(), f.path.clone()))
            .collect();

        let graph = adjacency_graph(&files);
        let paths = graph.find_paths(start.id.as_str(), end.id.as_str())?;
        Ok(paths
            .into_iter()
            .map(|path| {
                path.into_iter()
                    .map(|id| names.get(&id).cloned().unwrap_or(id))
                    .collect()
            })
            .collect())
    }

    /// Every stored edge half without its mirror, across Files and Records
    ///
    /// An empty result means the adjacency sets are symmetric.
    ///
    /// # Errors
    /// Persistence or decoding failure
    pub fn check_symmetry(&self) -> Result<Vec<Asymmetry>> {
        let mut found = asymmetries(&self.all_files()?);
        found.extend(asymmetries(&self.all_records()?));
        Ok(found.into_iter().collect())
    }
}

fn adjacency_graph<A: Adjacent>(nodes: &[A]) -> DirectedGraph {
    DirectedGraph::from_adjacency(nodes.iter().map(|node| {
        (
            node.id().to_string(),
            node.successors()
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
        )
    }))
}

fn asymmetries<A: Adjacent>(nodes: &[A]) -> BTreeSet<Asymmetry> {
    let by_id: BTreeMap<&A::Id, &A> = nodes.iter().map(|n| (n.id(), n)).collect();
    let mut found = BTreeSet::new();
    let mut flag = |predecessor: &A::Id, successor: &A::Id| {
        found.insert(Asymmetry {
            kind: A::KIND,
            predecessor: predecessor.to_string(),
            successor: successor.to_string(),
        });
    };

    for node in nodes {
        for successor in node.successors() {
            let mirrored = by_id
                .get(successor)
                .is_some_and(|s| s.predecessors().contains(node.id()));
            if !mirrored {
                flag(node.id(), successor);
            }
        }
        for predecessor in node.predecessors() {
            let mirrored = by_id
                .get(predecessor)
                .is_some_and(|p| p.successors().contains(node.id()));
            if !mirrored {
                flag(predecessor, node.id());
            }
        }
    }
    found
}
