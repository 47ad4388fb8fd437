use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
  /// A node reaches itself. `path` starts and ends with the same node.
  #[error("cycle detected: {}", path.join(" -> "))]
  Cycle { path: Vec<String> },

  #[error("node not found: {0}")]
  UnknownNode(String),

  #[error("graph has no root (no node without incoming edges)")]
  NoRoot,

  #[error("graph has no unique root, candidates: {}", candidates.join(", "))]
  AmbiguousRoot { candidates: Vec<String> },
}
