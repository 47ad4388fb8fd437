use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::error::GraphError;

static EMPTY: BTreeSet<String> = BTreeSet::new();

/// Which way a level walk follows the edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
  /// Prerequisites before dependents.
  #[default]
  Forward,
  /// Dependents before prerequisites, e.g. for tearing a workflow down.
  Reverse,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
  Visiting,
  Done,
}

/// Directed graph over string node ids.
///
/// Edges point from a prerequisite to its dependent. Both directions are
/// indexed so upstream and downstream lookups are cheap, and all storage is
/// ordered so every traversal is deterministic.
#[derive(Debug, Clone, Default)]
pub struct Graph {
  /// node_id -> dependents.
  downstream: BTreeMap<String, BTreeSet<String>>,
  /// node_id -> prerequisites.
  upstream: BTreeMap<String, BTreeSet<String>>,
}

impl Graph {
  pub fn new() -> Self {
    Self::default()
  }

  /// Add a node. Returns false if it was already present.
  pub fn add_node(&mut self, id: impl Into<String>) -> bool {
    let id = id.into();
    if self.downstream.contains_key(&id) {
      return false;
    }
    self.upstream.insert(id.clone(), BTreeSet::new());
    self.downstream.insert(id, BTreeSet::new());
    true
  }

  /// Remove a node together with every edge touching it.
  pub fn remove_node(&mut self, id: &str) -> bool {
    let Some(children) = self.downstream.remove(id) else {
      return false;
    };
    let parents = self.upstream.remove(id).unwrap_or_default();

    for child in &children {
      if let Some(set) = self.upstream.get_mut(child) {
        set.remove(id);
      }
    }
    for parent in &parents {
      if let Some(set) = self.downstream.get_mut(parent) {
        set.remove(id);
      }
    }
    true
  }

  /// Add the edge `from -> to`. Both nodes must already exist.
  pub fn connect(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
    if !self.contains(from) {
      return Err(GraphError::UnknownNode(from.to_string()));
    }
    if !self.contains(to) {
      return Err(GraphError::UnknownNode(to.to_string()));
    }
    if let Some(children) = self.downstream.get_mut(from) {
      children.insert(to.to_string());
    }
    if let Some(parents) = self.upstream.get_mut(to) {
      parents.insert(from.to_string());
    }
    Ok(())
  }

  /// Remove the edge `from -> to`. Returns false if it did not exist.
  pub fn disconnect(&mut self, from: &str, to: &str) -> bool {
    let removed = self
      .downstream
      .get_mut(from)
      .is_some_and(|children| children.remove(to));
    if let Some(parents) = self.upstream.get_mut(to) {
      parents.remove(from);
    }
    removed
  }

  pub fn contains(&self, id: &str) -> bool {
    self.downstream.contains_key(id)
  }

  pub fn len(&self) -> usize {
    self.downstream.len()
  }

  pub fn is_empty(&self) -> bool {
    self.downstream.is_empty()
  }

  /// All node ids in ascending order.
  pub fn nodes(&self) -> impl Iterator<Item = &str> + '_ {
    self.downstream.keys().map(String::as_str)
  }

  /// All edges as `(prerequisite, dependent)` pairs.
  pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
    self.downstream.iter().flat_map(|(from, children)| {
      children
        .iter()
        .map(move |to| (from.as_str(), to.as_str()))
    })
  }

  /// Direct dependents of a node.
  pub fn downstream(&self, id: &str) -> &BTreeSet<String> {
    self.downstream.get(id).unwrap_or(&EMPTY)
  }

  /// Direct prerequisites of a node.
  pub fn upstream(&self, id: &str) -> &BTreeSet<String> {
    self.upstream.get(id).unwrap_or(&EMPTY)
  }

  /// Nodes with no incoming edges.
  pub fn entry_points(&self) -> Vec<&str> {
    self
      .upstream
      .iter()
      .filter(|(_, parents)| parents.is_empty())
      .map(|(id, _)| id.as_str())
      .collect()
  }

  /// Nodes with no outgoing edges.
  pub fn exit_points(&self) -> Vec<&str> {
    self
      .downstream
      .iter()
      .filter(|(_, children)| children.is_empty())
      .map(|(id, _)| id.as_str())
      .collect()
  }

  /// The single entry point of the graph.
  pub fn root(&self) -> Result<&str, GraphError> {
    unique(self.entry_points())
  }

  /// The single exit point of the graph.
  pub fn sink(&self) -> Result<&str, GraphError> {
    unique(self.exit_points())
  }

  /// Check that no node reaches itself.
  pub fn validate(&self) -> Result<(), GraphError> {
    let mut marks: HashMap<&str, Mark> = HashMap::with_capacity(self.len());
    let mut stack: Vec<&str> = Vec::new();

    for node in self.nodes() {
      if !marks.contains_key(node) {
        self.visit(node, &mut marks, &mut stack)?;
      }
    }
    Ok(())
  }

  fn visit<'a>(
    &'a self,
    node: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
  ) -> Result<(), GraphError> {
    marks.insert(node, Mark::Visiting);
    stack.push(node);

    for next in self.downstream(node) {
      match marks.get(next.as_str()) {
        Some(Mark::Visiting) => {
          let start = stack.iter().position(|n| *n == next.as_str()).unwrap_or(0);
          let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
          path.push(next.clone());
          return Err(GraphError::Cycle { path });
        }
        Some(Mark::Done) => {}
        None => self.visit(next, marks, stack)?,
      }
    }

    stack.pop();
    marks.insert(node, Mark::Done);
    Ok(())
  }

  /// Whether `to` can be reached from `from` by following edges forward.
  pub fn reaches(&self, from: &str, to: &str) -> bool {
    self.reachable(from, Direction::Forward).contains(to)
  }

  /// Drop every edge that is implied by a longer path.
  ///
  /// Only meaningful on an acyclic graph; call [`Graph::validate`] first.
  pub fn transitive_reduction(&mut self) {
    let mut redundant = Vec::new();

    for (node, children) in &self.downstream {
      for child in children {
        let implied = children
          .iter()
          .filter(|other| *other != child)
          .any(|other| self.reaches(other, child));
        if implied {
          redundant.push((node.clone(), child.clone()));
        }
      }
    }

    for (from, to) in redundant {
      self.disconnect(&from, &to);
    }
  }

  /// Group the nodes reachable from a start node into levels.
  ///
  /// Without an explicit start the unique root is used (or the unique sink
  /// when walking in reverse). A node's level is the length of the longest
  /// path from the start to it, so every node sits strictly above all of its
  /// reachable predecessors. Ids inside a level are sorted.
  pub fn levels(
    &self,
    start: Option<&str>,
    direction: Direction,
  ) -> Result<Vec<Vec<String>>, GraphError> {
    self.validate()?;

    let start = match start {
      Some(id) if self.contains(id) => id,
      Some(id) => return Err(GraphError::UnknownNode(id.to_string())),
      None => match direction {
        Direction::Forward => self.root()?,
        Direction::Reverse => self.sink()?,
      },
    };

    let reachable = self.reachable(start, direction);

    // In-degree of every reachable node, counting only reachable predecessors.
    let mut pending: HashMap<&str, usize> = reachable
      .iter()
      .map(|node| {
        let count = self
          .previous(node, direction)
          .iter()
          .filter(|p| reachable.contains(p.as_str()))
          .count();
        (*node, count)
      })
      .collect();

    let mut depth: HashMap<&str, usize> = HashMap::from([(start, 0)]);
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
      let level = depth.get(node).copied().unwrap_or(0);
      for next in self.next(node, direction) {
        let next = next.as_str();
        let entry = depth.entry(next).or_insert(0);
        *entry = (*entry).max(level + 1);

        if let Some(count) = pending.get_mut(next) {
          *count = count.saturating_sub(1);
          if *count == 0 {
            queue.push_back(next);
          }
        }
      }
    }

    let height = depth.values().copied().max().unwrap_or(0) + 1;
    let mut levels: Vec<Vec<String>> = vec![Vec::new(); height];
    for node in &reachable {
      if let Some(level) = depth.get(node) {
        levels[*level].push(node.to_string());
      }
    }
    Ok(levels)
  }

  /// Every node reachable from `start`, including `start` itself.
  fn reachable(&self, start: &str, direction: Direction) -> BTreeSet<&str> {
    let mut seen = BTreeSet::new();
    let Some((start, _)) = self.downstream.get_key_value(start) else {
      return seen;
    };

    let mut stack = vec![start.as_str()];
    while let Some(node) = stack.pop() {
      if !seen.insert(node) {
        continue;
      }
      stack.extend(self.next(node, direction).iter().map(String::as_str));
    }
    seen
  }

  fn next(&self, id: &str, direction: Direction) -> &BTreeSet<String> {
    match direction {
      Direction::Forward => self.downstream(id),
      Direction::Reverse => self.upstream(id),
    }
  }

  fn previous(&self, id: &str, direction: Direction) -> &BTreeSet<String> {
    match direction {
      Direction::Forward => self.upstream(id),
      Direction::Reverse => self.downstream(id),
    }
  }
}

fn unique(candidates: Vec<&str>) -> Result<&str, GraphError> {
  match candidates.as_slice() {
    [] => Err(GraphError::NoRoot),
    [only] => Ok(*only),
    many => Err(GraphError::AmbiguousRoot {
      candidates: many.iter().map(|c| c.to_string()).collect(),
    }),
  }
}
