//! The flow: an ordered collection of nodes wired through their interfaces.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::FlowError;
use crate::graph::Graph;
use crate::interface::{Interface, InterfaceRef, NodeKey, render_scalar};
use crate::node::Node;

/// A work-flow in which each [`Node`] runs one operation.
///
/// `Clone` is shallow: the copy shares task objects and interface content
/// with the flow it was cloned from. Treat a clone as a one-shot,
/// disposable snapshot, for instance to run a flow without saving it first.
#[derive(Debug, Clone, Default)]
pub struct Flow {
  modified: bool,
  filename: Option<PathBuf>,
  nodes: Vec<Node>,
}

impl Flow {
  pub fn new() -> Self {
    Self::default()
  }

  /// Dirty flag, set by every structural mutation.
  pub fn is_modified(&self) -> bool {
    self.modified
  }

  pub fn set_modified(&mut self, modified: bool) {
    self.modified = modified;
  }

  pub fn filename(&self) -> Option<&Path> {
    self.filename.as_deref()
  }

  pub fn set_filename(&mut self, filename: Option<PathBuf>) {
    self.filename = filename;
  }

  pub fn nodes(&self) -> &[Node] {
    &self.nodes
  }

  pub fn node(&self, key: NodeKey) -> Option<&Node> {
    self.nodes.iter().find(|n| n.key() == key)
  }

  pub fn find_node(&self, node_id: &str) -> Result<&Node, FlowError> {
    self
      .nodes
      .iter()
      .find(|n| n.id() == node_id)
      .ok_or_else(|| not_found(node_id))
  }

  pub fn find_node_mut(&mut self, node_id: &str) -> Result<&mut Node, FlowError> {
    self
      .nodes
      .iter_mut()
      .find(|n| n.id() == node_id)
      .ok_or_else(|| not_found(node_id))
  }

  /// Resolve an interface by node id and interface name.
  pub fn find_interface(&self, node_id: &str, name: &str) -> Result<InterfaceRef, FlowError> {
    self.find_node(node_id)?.interface_ref(name)
  }

  pub fn interface(&self, at: InterfaceRef) -> Option<&Interface> {
    self.node(at.node).and_then(|n| n.interface(at.index))
  }

  /// Generate a node id not yet used in this flow: the label, then
  /// `label-2`, `label-3`, and so on.
  pub fn random_id(&self, label: &str) -> String {
    let stem = if label.is_empty() { "node" } else { label };
    let mut candidate = stem.to_string();
    let mut suffix = 2;
    while self.nodes.iter().any(|n| n.id() == candidate) {
      candidate = format!("{}-{}", stem, suffix);
      suffix += 1;
    }
    candidate
  }

  /// Add a node. A node without id gets one generated from its label.
  ///
  /// The node must not already belong to this flow and must not carry
  /// connectors: edges are only made through [`Flow::add_connector`].
  pub fn add_node(&mut self, mut node: Node) -> Result<NodeKey, FlowError> {
    if let Some(existing) = self.node(node.key()) {
      return Err(FlowError::DuplicateNode {
        node_id: existing.id().to_string(),
      });
    }
    let connected = node
      .interfaces()
      .iter()
      .any(|i| !i.successors().is_empty() || !i.predecessors().is_empty());
    if connected {
      return Err(FlowError::ForeignConnectors {
        node_id: node.id().to_string(),
      });
    }

    if node.id().is_empty() {
      let id = self.random_id(node.label());
      node.set_id(id);
    } else if self.nodes.iter().any(|n| n.id() == node.id()) {
      return Err(FlowError::DuplicateId {
        node_id: node.id().to_string(),
      });
    }

    debug!(node = %node, "adding node");
    let key = node.key();
    self.nodes.push(node);
    self.modified = true;
    Ok(key)
  }

  /// Remove a node after severing every edge touching its interfaces.
  pub fn remove_node(&mut self, node_id: &str) -> Result<Node, FlowError> {
    let position = self.position_of_id(node_id)?;

    let mut edges = Vec::new();
    for interface in self.nodes[position].interfaces() {
      for successor in interface.successors() {
        edges.push((interface.at(), *successor));
      }
      for predecessor in interface.predecessors() {
        edges.push((*predecessor, interface.at()));
      }
    }
    for (from, to) in edges {
      self.remove_connector(from, to)?;
    }

    let node = self.nodes.remove(position);
    debug!(node = %node, "removed node");
    self.modified = true;
    Ok(node)
  }

  /// Connect `from` (upstream) to `to` (downstream).
  pub fn add_connector(&mut self, from: InterfaceRef, to: InterfaceRef) -> Result<(), FlowError> {
    let source = self.resolve(from)?;
    let target = self.resolve(to)?;

    if source.successors().contains(&to) || target.successors().contains(&from) {
      return Err(FlowError::DuplicateEdge {
        from: source.to_string(),
        to: target.to_string(),
      });
    }
    if !target.is_compatible(source) {
      return Err(FlowError::Incompatible {
        upstream: source.to_string(),
        downstream: target.to_string(),
      });
    }

    self.resolve_mut(from)?.push_successor(to);
    let target = self.resolve_mut(to)?;
    target.push_predecessor(from);
    target.set_slot(true);

    debug!(from = ?from, to = ?to, "added connector");
    self.modified = true;
    Ok(())
  }

  /// Connect two interfaces addressed by node id and interface name.
  pub fn connect(
    &mut self,
    from_node: &str,
    from_interface: &str,
    to_node: &str,
    to_interface: &str,
  ) -> Result<(), FlowError> {
    let from = self.find_interface(from_node, from_interface)?;
    let to = self.find_interface(to_node, to_interface)?;
    self.add_connector(from, to)
  }

  pub fn remove_connector(&mut self, from: InterfaceRef, to: InterfaceRef) -> Result<(), FlowError> {
    let source = self.resolve(from)?;
    let target = self.resolve(to)?;
    if !source.successors().contains(&to) {
      return Err(FlowError::EdgeNotFound {
        from: source.to_string(),
        to: target.to_string(),
      });
    }

    self.resolve_mut(from)?.drop_successor(to);
    self.resolve_mut(to)?.drop_predecessor(from);
    self.modified = true;
    Ok(())
  }

  /// Nodes with no predecessor node.
  pub fn start_nodes(&self) -> Vec<&Node> {
    self
      .nodes
      .iter()
      .filter(|n| n.predecessor_keys().is_empty())
      .collect()
  }

  pub fn node_predecessors(&self, node_id: &str) -> Result<Vec<&Node>, FlowError> {
    let keys = self.find_node(node_id)?.predecessor_keys();
    Ok(keys.into_iter().filter_map(|k| self.node(k)).collect())
  }

  pub fn node_successors(&self, node_id: &str) -> Result<Vec<&Node>, FlowError> {
    let keys = self.find_node(node_id)?.successor_keys();
    Ok(keys.into_iter().filter_map(|k| self.node(k)).collect())
  }

  pub fn graph(&self) -> Graph {
    Graph::new(&self.nodes)
  }

  /// Topological layer of every node, keyed by node identity.
  pub fn incidences(&self) -> Result<HashMap<NodeKey, u32>, FlowError> {
    self.graph().incidences().map_err(|stuck| FlowError::Cycle {
      nodes: stuck
        .into_iter()
        .filter_map(|k| self.node(k).map(|n| n.id().to_string()))
        .collect(),
    })
  }

  /// Recompute incidences and reorder nodes canonically: by incidence, then id.
  pub fn sort_nodes_by_incidence(&mut self) -> Result<(), FlowError> {
    let layers = self.incidences()?;
    for node in &mut self.nodes {
      node.set_incidence(layers.get(&node.key()).copied().unwrap_or(1));
    }
    self.nodes.sort_by(|a, b| a.id().cmp(b.id()));
    self.nodes.sort_by_key(|n| n.incidence());
    Ok(())
  }

  /// Canonical node order without touching the flow.
  pub fn canonical_order(&self) -> Result<Vec<&Node>, FlowError> {
    let layers = self.incidences()?;
    let mut ordered: Vec<&Node> = self.nodes.iter().collect();
    ordered.sort_by(|a, b| a.id().cmp(b.id()));
    ordered.sort_by_key(|n| layers.get(&n.key()).copied().unwrap_or(1));
    Ok(ordered)
  }

  pub fn cli_parameter_nodes(&self) -> Vec<&Node> {
    self
      .nodes
      .iter()
      .filter(|n| n.is_cli_parameter_node())
      .collect()
  }

  /// Ids of CLI-parameter nodes whose parameter is unset and unconnected.
  pub fn missing_cli_parameters(&self) -> Vec<String> {
    self
      .cli_parameter_nodes()
      .into_iter()
      .filter(|node| {
        let Some(name) = node.task().cli_parameter() else {
          return false;
        };
        match node.find_interface(name) {
          Ok(interface) => {
            interface.predecessors().is_empty()
              && render_scalar(interface.value().as_ref()).is_empty()
          }
          Err(_) => true,
        }
      })
      .map(|node| node.id().to_string())
      .collect()
  }

  /// Supply CLI-parameter values, keyed by node id, as literals.
  pub fn apply_cli_arguments(&mut self, arguments: &HashMap<String, String>) -> Result<(), FlowError> {
    for (node_id, value) in arguments {
      let node = self.find_node_mut(node_id)?;
      let name = node
        .task()
        .cli_parameter()
        .ok_or_else(|| FlowError::NotCliParameter {
          node_id: node_id.clone(),
        })?
        .to_string();
      let interface = node.find_interface_mut(&name)?;
      interface.set_value(Some(Value::String(value.clone())))?;
      interface.set_slot(false);
    }
    Ok(())
  }

  /// Rename a node, keeping ids unique.
  pub fn rename_node(&mut self, node_id: &str, new_id: &str) -> Result<(), FlowError> {
    if node_id == new_id {
      return Ok(());
    }
    if self.nodes.iter().any(|n| n.id() == new_id) {
      return Err(FlowError::DuplicateId {
        node_id: new_id.to_string(),
      });
    }
    self.find_node_mut(node_id)?.set_id(new_id.to_string());
    self.modified = true;
    Ok(())
  }

  /// Apply edited attributes to a node. The `id` entry renames the node;
  /// every other entry names an interface and carries its value and slot flag.
  pub fn apply_attributes(
    &mut self,
    node_id: &str,
    entries: BTreeMap<String, (Option<Value>, bool)>,
  ) -> Result<(), FlowError> {
    let mut current_id = node_id.to_string();
    if let Some((Some(new_id), _)) = entries.get("id") {
      let new_id = render_scalar(Some(new_id));
      self.rename_node(&current_id, &new_id)?;
      current_id = new_id;
    }

    let node = self.find_node_mut(&current_id)?;
    for (name, (value, slot)) in entries.into_iter().filter(|(name, _)| name != "id") {
      let interface = node.find_interface_mut(&name)?;
      if interface.is_value() {
        interface.set_value(value)?;
      }
      interface.set_slot(slot);
    }
    self.modified = true;
    Ok(())
  }

  /// Store the editor position of a node. Returns whether it moved.
  pub fn apply_position(&mut self, node_id: &str, x: i64, y: i64) -> Result<bool, FlowError> {
    let node = self.find_node_mut(node_id)?;
    let (x, y) = (x.to_string(), y.to_string());
    let properties = node.graphical_properties_mut();
    let moved = properties.get("x") != Some(&x) || properties.get("y") != Some(&y);
    properties.insert("x".to_string(), x);
    properties.insert("y".to_string(), y);
    if moved {
      self.modified = true;
    }
    Ok(moved)
  }

  /// Release temporary resources of every node.
  pub fn clean(&self) {
    for node in &self.nodes {
      node.clean();
    }
  }

  fn position_of_id(&self, node_id: &str) -> Result<usize, FlowError> {
    self
      .nodes
      .iter()
      .position(|n| n.id() == node_id)
      .ok_or_else(|| not_found(node_id))
  }

  fn resolve(&self, at: InterfaceRef) -> Result<&Interface, FlowError> {
    let node = self.node(at.node).ok_or_else(|| unknown_key(at))?;
    node.interface(at.index).ok_or_else(|| missing_index(node.id(), at))
  }

  fn resolve_mut(&mut self, at: InterfaceRef) -> Result<&mut Interface, FlowError> {
    let node = self
      .nodes
      .iter_mut()
      .find(|n| n.key() == at.node)
      .ok_or_else(|| unknown_key(at))?;
    let node_id = node.id().to_string();
    node
      .interface_mut(at.index)
      .ok_or_else(|| missing_index(&node_id, at))
  }
}

fn not_found(node_id: &str) -> FlowError {
  FlowError::NodeNotFound {
    node_id: node_id.to_string(),
  }
}

fn unknown_key(at: InterfaceRef) -> FlowError {
  FlowError::NodeNotFound {
    node_id: format!("{:?}", at.node),
  }
}

fn missing_index(node_id: &str, at: InterfaceRef) -> FlowError {
  FlowError::InterfaceNotFound {
    node_id: node_id.to_string(),
    name: format!("#{}", at.index),
  }
}
