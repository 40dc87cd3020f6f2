use std::collections::{HashMap, VecDeque};

use crate::interface::NodeKey;
use crate::node::Node;

/// Node-level view of a flow for traversal and layering.
#[derive(Debug, Clone)]
pub struct Graph {
  /// Node keys in flow order.
  order: Vec<NodeKey>,
  /// Adjacency list: node -> distinct downstream nodes.
  adjacency: HashMap<NodeKey, Vec<NodeKey>>,
  /// Reverse adjacency: node -> distinct upstream nodes.
  reverse_adjacency: HashMap<NodeKey, Vec<NodeKey>>,
  /// Nodes with no upstream nodes.
  entry_points: Vec<NodeKey>,
}

impl Graph {
  /// Build the node graph from interface edges.
  pub fn new(nodes: &[Node]) -> Self {
    let order: Vec<NodeKey> = nodes.iter().map(Node::key).collect();
    let mut adjacency = HashMap::with_capacity(nodes.len());
    let mut reverse_adjacency = HashMap::with_capacity(nodes.len());

    for node in nodes {
      let known = |key: &NodeKey| order.contains(key);
      let downstream: Vec<NodeKey> = node.successor_keys().into_iter().filter(known).collect();
      let upstream: Vec<NodeKey> = node.predecessor_keys().into_iter().filter(known).collect();
      adjacency.insert(node.key(), downstream);
      reverse_adjacency.insert(node.key(), upstream);
    }

    let entry_points = order
      .iter()
      .filter(|key| reverse_adjacency.get(*key).is_none_or(|v: &Vec<NodeKey>| v.is_empty()))
      .copied()
      .collect();

    Self {
      order,
      adjacency,
      reverse_adjacency,
      entry_points,
    }
  }

  pub fn entry_points(&self) -> &[NodeKey] {
    &self.entry_points
  }

  pub fn downstream(&self, key: NodeKey) -> &[NodeKey] {
    self
      .adjacency
      .get(&key)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn upstream(&self, key: NodeKey) -> &[NodeKey] {
    self
      .reverse_adjacency
      .get(&key)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Longest-path layering from the entry points, which sit on layer 1.
  ///
  /// A node reachable along several paths settles on the deepest layer, so
  /// the result does not depend on traversal order. Nodes that cannot be
  /// layered because they sit on or behind a cycle are returned as the error.
  pub fn incidences(&self) -> Result<HashMap<NodeKey, u32>, Vec<NodeKey>> {
    let mut pending: HashMap<NodeKey, usize> = self
      .order
      .iter()
      .map(|key| (*key, self.upstream(*key).len()))
      .collect();
    let mut layers: HashMap<NodeKey, u32> = HashMap::with_capacity(self.order.len());
    let mut queue: VecDeque<NodeKey> = VecDeque::new();

    for key in &self.entry_points {
      layers.insert(*key, 1);
      queue.push_back(*key);
    }

    while let Some(key) = queue.pop_front() {
      let layer = layers[&key];
      for next in self.downstream(key) {
        let slot = layers.entry(*next).or_insert(0);
        *slot = (*slot).max(layer + 1);
        if let Some(remaining) = pending.get_mut(next) {
          *remaining -= 1;
          if *remaining == 0 {
            queue.push_back(*next);
          }
        }
      }
    }

    let stuck: Vec<NodeKey> = self
      .order
      .iter()
      .filter(|key| pending.get(*key).is_some_and(|n| *n > 0))
      .copied()
      .collect();
    if stuck.is_empty() {
      Ok(layers)
    } else {
      Err(stuck)
    }
  }
}
