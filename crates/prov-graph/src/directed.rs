//! Adjacency-set directed graph over string identifiers
//!
//! [`DirectedGraph`] is independent of any storage: callers rebuild it from
//! whatever adjacency they hold and use it for reachability and path queries.

use crate::error::GraphError;
use parking_lot::RwLock;
use petgraph::algo::all_simple_paths;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Predecessors and successors of a single node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbors {
    pub predecessors: BTreeSet<String>,
    pub successors: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
struct Inner {
    graph: StableDiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl Inner {
    fn lookup(&self, node: &str) -> Result<NodeIndex, GraphError> {
        self.index
            .get(node)
            .copied()
            .ok_or_else(|| GraphError::UnknownNode(node.to_string()))
    }

    fn insert(&mut self, node: &str) -> Result<NodeIndex, GraphError> {
        if self.index.contains_key(node) {
            return Err(GraphError::DuplicateNode(node.to_string()));
        }
        let ix = self.graph.add_node(node.to_string());
        self.index.insert(node.to_string(), ix);
        Ok(ix)
    }

    fn ensure(&mut self, node: &str) -> NodeIndex {
        match self.index.get(node) {
            Some(ix) => *ix,
            None => {
                let ix = self.graph.add_node(node.to_string());
                self.index.insert(node.to_string(), ix);
                ix
            }
        }
    }

    fn remove_arc(&mut self, start: &str, end: &str) -> Result<(), GraphError> {
        let from = self.lookup(start)?;
        let to = self.lookup(end)?;
        let edge = self
            .graph
            .find_edge(from, to)
            .ok_or_else(|| GraphError::UnknownArc {
                start: start.to_string(),
                end: end.to_string(),
            })?;
        self.graph.remove_edge(edge);
        Ok(())
    }

    fn paths(&self, start: &str, end: &str) -> Result<Vec<Vec<String>>, GraphError> {
        let from = self.lookup(start)?;
        let Some(&to) = self.index.get(end) else {
            return Ok(Vec::new());
        };

        // A node reaches itself through the trivial path; cycles back to it are not simple.
        if from == to {
            return Ok(vec![vec![start.to_string()]]);
        }

        let found = all_simple_paths::<Vec<NodeIndex>, _>(&self.graph, from, to, 0, None)
            .map(|path| path.into_iter().map(|ix| self.graph[ix].clone()).collect())
            .collect();
        Ok(found)
    }
}

/// Directed graph with set semantics for arcs
///
/// At most one arc exists between an ordered pair of nodes; adding an
/// existing arc is a no-op. All operations take `&self` and synchronize
/// internally, so a graph can be shared across threads for analysis.
#[derive(Debug, Default)]
pub struct DirectedGraph {
    inner: RwLock<Inner>,
}

impl Clone for DirectedGraph {
    fn clone(&self) -> Self {
        Self {
            inner: RwLock::new(self.inner.read().clone()),
        }
    }
}

impl DirectedGraph {
    /// Create an empty graph
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `node -> successors` adjacency
    ///
    /// Successors that never appear as keys are created implicitly.
    #[must_use]
    pub fn from_adjacency<I, S, N>(adjacency: I) -> Self
    where
        I: IntoIterator<Item = (N, S)>,
        S: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let graph = Self::new();
        {
            let mut inner = graph.inner.write();
            for (node, successors) in adjacency {
                let from = inner.ensure(node.as_ref());
                for successor in successors {
                    let to = inner.ensure(successor.as_ref());
                    inner.graph.update_edge(from, to, ());
                }
            }
        }
        graph
    }

    /// Add a node
    ///
    /// # Errors
    /// [`GraphError::DuplicateNode`] if the node is already present
    pub fn add_node(&self, node: &str) -> Result<(), GraphError> {
        self.inner.write().insert(node).map(|_| ())
    }

    /// Add several nodes, stopping at the first duplicate
    ///
    /// # Errors
    /// [`GraphError::DuplicateNode`] on the first node already present
    pub fn add_nodes<I, N>(&self, nodes: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let mut inner = self.inner.write();
        for node in nodes {
            inner.insert(node.as_ref())?;
        }
        Ok(())
    }

    /// Remove a node together with every arc touching it
    ///
    /// # Errors
    /// [`GraphError::UnknownNode`] if the node is absent
    pub fn delete_node(&self, node: &str) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        let ix = inner.lookup(node)?;
        inner.graph.remove_node(ix);
        inner.index.remove(node);
        Ok(())
    }

    /// Add an arc `start -> end`
    ///
    /// With `create_missing` unset both endpoints must already exist.
    ///
    /// # Errors
    /// [`GraphError::UnknownNode`] for a missing endpoint when `create_missing` is false
    pub fn add_arc(&self, start: &str, end: &str, create_missing: bool) -> Result<(), GraphError> {
        let mut inner = self.inner.write();
        let (from, to) = if create_missing {
            (inner.ensure(start), inner.ensure(end))
        } else {
            (inner.lookup(start)?, inner.lookup(end)?)
        };
        inner.graph.update_edge(from, to, ());
        Ok(())
    }

    /// Remove the single arc `start -> end`
    ///
    /// # Errors
    /// [`GraphError::UnknownNode`] for a missing endpoint,
    /// [`GraphError::UnknownArc`] if the nodes exist but are not connected
    pub fn delete_arc(&self, start: &str, end: &str) -> Result<(), GraphError> {
        self.inner.write().remove_arc(start, end)
    }

    /// Remove every arc lying on any simple path from `start` to `end`
    ///
    /// This is broader than [`DirectedGraph::delete_arc`]: intermediate arcs
    /// of multi-hop paths go too, including arcs shared with paths between
    /// other nodes. Returns the number of arcs removed; an absent `end`
    /// removes nothing.
    ///
    /// # Errors
    /// [`GraphError::UnknownNode`] if `start` is absent
    pub fn delete_arcs(&self, start: &str, end: &str) -> Result<usize, GraphError> {
        let mut inner = self.inner.write();
        let paths = inner.paths(start, end)?;

        let mut arcs: Vec<(String, String)> = Vec::new();
        let mut seen = HashSet::new();
        for path in &paths {
            for pair in path.windows(2) {
                let arc = (pair[0].clone(), pair[1].clone());
                if seen.insert(arc.clone()) {
                    arcs.push(arc);
                }
            }
        }

        for (from, to) in &arcs {
            inner.remove_arc(from, to)?;
        }
        tracing::debug!(start, end, removed = arcs.len(), "deleted arcs on paths");
        Ok(arcs.len())
    }

    /// Enumerate every simple path from `start` to `end`
    ///
    /// Result order follows discovery order and is not meant to be relied
    /// upon. Disconnected nodes and an absent `end` yield an empty list.
    ///
    /// # Errors
    /// [`GraphError::UnknownNode`] if `start` is absent
    pub fn find_paths(&self, start: &str, end: &str) -> Result<Vec<Vec<String>>, GraphError> {
        self.inner.read().paths(start, end)
    }

    /// Predecessor and successor sets of `node`
    ///
    /// # Errors
    /// [`GraphError::UnknownNode`] if the node is absent
    pub fn neighbors(&self, node: &str) -> Result<Neighbors, GraphError> {
        let inner = self.inner.read();
        let ix = inner.lookup(node)?;
        let collect = |direction| {
            inner
                .graph
                .neighbors_directed(ix, direction)
                .map(|n| inner.graph[n].clone())
                .collect::<BTreeSet<_>>()
        };
        Ok(Neighbors {
            predecessors: collect(Direction::Incoming),
            successors: collect(Direction::Outgoing),
        })
    }

    /// Whether the arc `start -> end` exists
    #[must_use]
    pub fn has_arc(&self, start: &str, end: &str) -> bool {
        let inner = self.inner.read();
        match (inner.index.get(start), inner.index.get(end)) {
            (Some(from), Some(to)) => inner.graph.find_edge(*from, *to).is_some(),
            _ => false,
        }
    }

    /// Whether `node` is part of the graph
    #[inline]
    #[must_use]
    pub fn contains(&self, node: &str) -> bool {
        self.inner.read().index.contains_key(node)
    }

    /// Node count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().graph.node_count()
    }

    /// Whether the graph has no nodes
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Arc count
    #[inline]
    #[must_use]
    pub fn arc_count(&self) -> usize {
        self.inner.read().graph.edge_count()
    }

    /// All node identifiers, sorted
    #[must_use]
    pub fn nodes(&self) -> Vec<String> {
        let inner = self.inner.read();
        let mut nodes: Vec<String> = inner.index.keys().cloned().collect();
        nodes.sort();
        nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn diamond() -> DirectedGraph {
        DirectedGraph::from_adjacency([
            ("a", vec!["b", "c"]),
            ("b", vec!["d"]),
            ("c", vec!["d"]),
        ])
    }

    fn sorted(mut paths: Vec<Vec<String>>) -> Vec<Vec<String>> {
        paths.sort();
        paths
    }

    #[test]
    fn add_node_rejects_duplicates() {
        let graph = DirectedGraph::new();
        graph.add_node("a").unwrap();
        assert_eq!(
            graph.add_node("a"),
            Err(GraphError::DuplicateNode("a".to_string()))
        );
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn add_arc_requires_nodes_unless_creating() {
        let graph = DirectedGraph::new();
        graph.add_node("a").unwrap();
        assert_eq!(
            graph.add_arc("a", "b", false),
            Err(GraphError::UnknownNode("b".to_string()))
        );

        graph.add_arc("a", "b", true).unwrap();
        assert!(graph.contains("b"));
        assert!(graph.has_arc("a", "b"));
    }

    #[test]
    fn add_arc_twice_keeps_one_arc() {
        let graph = DirectedGraph::new();
        graph.add_arc("a", "b", true).unwrap();
        graph.add_arc("a", "b", true).unwrap();
        assert_eq!(graph.arc_count(), 1);
    }

    #[test]
    fn delete_arc_reports_missing_arc() {
        let graph = diamond();
        assert_eq!(
            graph.delete_arc("b", "c"),
            Err(GraphError::UnknownArc {
                start: "b".to_string(),
                end: "c".to_string()
            })
        );
        assert_eq!(
            graph.delete_arc("a", "z"),
            Err(GraphError::UnknownNode("z".to_string()))
        );
        graph.delete_arc("a", "b").unwrap();
        assert!(!graph.has_arc("a", "b"));
    }

    #[test]
    fn find_paths_in_diamond() {
        let graph = diamond();
        let paths = sorted(graph.find_paths("a", "d").unwrap());
        assert_eq!(
            paths,
            vec![
                vec!["a".to_string(), "b".to_string(), "d".to_string()],
                vec!["a".to_string(), "c".to_string(), "d".to_string()],
            ]
        );
    }

    #[test]
    fn find_paths_between_disconnected_nodes_is_empty() {
        let graph = diamond();
        graph.add_node("x").unwrap();
        assert!(graph.find_paths("x", "a").unwrap().is_empty());
        assert!(graph.find_paths("d", "a").unwrap().is_empty());
    }

    #[test]
    fn find_paths_terminates_on_cycles() {
        let graph = DirectedGraph::from_adjacency([
            ("a", vec!["b"]),
            ("b", vec!["c", "a"]),
            ("c", vec!["b", "d"]),
        ]);
        let paths = graph.find_paths("a", "d").unwrap();
        assert_eq!(
            paths,
            vec![vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string()
            ]]
        );
    }

    #[test]
    fn find_paths_from_node_to_itself() {
        let graph = diamond();
        assert_eq!(graph.find_paths("a", "a").unwrap(), vec![vec!["a".to_string()]]);
    }

    #[test]
    fn delete_arcs_removes_every_path_arc() {
        let graph = diamond();
        graph.add_arc("d", "e", true).unwrap();

        let removed = graph.delete_arcs("a", "d").unwrap();
        assert_eq!(removed, 4);
        assert_eq!(graph.arc_count(), 1);
        assert!(graph.has_arc("d", "e"));
        assert!(graph.find_paths("a", "d").unwrap().is_empty());
    }

    #[test]
    fn delete_arcs_handles_shared_prefixes() {
        // a -> b is shared by a-b-d and a-b-c-d
        let graph = DirectedGraph::from_adjacency([
            ("a", vec!["b"]),
            ("b", vec!["c", "d"]),
            ("c", vec!["d"]),
        ]);
        assert_eq!(graph.delete_arcs("a", "d").unwrap(), 4);
        assert_eq!(graph.arc_count(), 0);
    }

    #[test]
    fn delete_node_drops_incident_arcs() {
        let graph = diamond();
        graph.delete_node("b").unwrap();
        assert!(!graph.contains("b"));
        assert_eq!(graph.arc_count(), 2);
        assert_eq!(graph.find_paths("a", "d").unwrap().len(), 1);
        assert_eq!(
            graph.delete_node("b"),
            Err(GraphError::UnknownNode("b".to_string()))
        );
    }

    #[test]
    fn unknown_end_has_no_paths() {
        let graph = diamond();
        assert!(graph.find_paths("a", "nowhere").unwrap().is_empty());
        assert_eq!(graph.delete_arcs("a", "nowhere"), Ok(0));
        assert_eq!(graph.arc_count(), 4);
        assert_eq!(
            graph.find_paths("nowhere", "a"),
            Err(GraphError::UnknownNode("nowhere".to_string()))
        );
    }

    #[test]
    fn neighbors_lists_both_directions() {
        let graph = diamond();
        let d = graph.neighbors("d").unwrap();
        assert_eq!(
            d.predecessors,
            ["b", "c"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert!(d.successors.is_empty());
    }

    #[test]
    fn clone_is_independent() {
        let graph = diamond();
        let copy = graph.clone();
        copy.delete_arc("a", "b").unwrap();
        assert!(graph.has_arc("a", "b"));
        assert_eq!(graph.nodes(), vec!["a", "b", "c", "d"]);
    }
}
