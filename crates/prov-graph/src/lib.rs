//! Provenance Graph
//!
//! A standalone directed graph over opaque string identifiers, used for
//! reachability and impact analysis on top of persisted adjacency.
//!
//! # Example
//!
//! ```rust
//! use prov_graph::DirectedGraph;
//!
//! let graph = DirectedGraph::from_adjacency([
//!     ("a", vec!["b", "c"]),
//!     ("b", vec!["d"]),
//!     ("c", vec!["d"]),
//! ]);
//! assert_eq!(graph.find_paths("a", "d").unwrap().len(), 2);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod directed;
mod error;

pub use directed::{DirectedGraph, Neighbors};
pub use error::GraphError;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
