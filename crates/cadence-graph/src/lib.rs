//! Cadence Graph
//!
//! A small owned directed graph for workflow steps. Nodes are step ids and
//! edges point from a prerequisite to its dependent.
//!
//! The graph supports:
//! - Node and edge mutation
//! - Cycle validation (DFS colouring, reports the offending path)
//! - Transitive reduction
//! - Level ordering: groups of nodes that can run together, computed as the
//!   longest path from a root

mod error;
mod graph;

pub use error::GraphError;
pub use graph::{Direction, Graph};
