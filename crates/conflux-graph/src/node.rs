use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::FlowError;
use crate::interface::{Interface, InterfaceRef, NodeKey};
use crate::task::Task;

/// A unit of work in a flow.
///
/// The node owns the interfaces its task declared, in declaration order.
/// Cloning a node keeps its identity: the clone shares task and content.
#[derive(Clone)]
pub struct Node {
  key: NodeKey,
  id: String,
  incidence: u32,
  task: Arc<dyn Task>,
  interfaces: Vec<Interface>,
  graphical_properties: BTreeMap<String, String>,
}

impl Node {
  pub fn new(task: impl Task + 'static) -> Self {
    Self::from_task(Arc::new(task))
  }

  pub fn from_task(task: Arc<dyn Task>) -> Self {
    let key = NodeKey::next();
    let interfaces = task
      .interfaces()
      .into_iter()
      .enumerate()
      .map(|(index, spec)| Interface::from_spec(InterfaceRef { node: key, index }, "", spec))
      .collect();

    Self {
      key,
      id: String::new(),
      incidence: 0,
      task,
      interfaces,
      graphical_properties: BTreeMap::new(),
    }
  }

  /// Set the id before the node joins a flow. An empty id asks the flow to
  /// generate one.
  pub fn with_id(mut self, id: impl Into<String>) -> Self {
    self.set_id(id.into());
    self
  }

  pub fn key(&self) -> NodeKey {
    self.key
  }

  pub fn id(&self) -> &str {
    &self.id
  }

  pub(crate) fn set_id(&mut self, id: String) {
    for interface in &mut self.interfaces {
      interface.set_owner(&id);
    }
    self.id = id;
  }

  /// Topological layer, valid after the flow last sorted its nodes.
  pub fn incidence(&self) -> u32 {
    self.incidence
  }

  pub(crate) fn set_incidence(&mut self, incidence: u32) {
    self.incidence = incidence;
  }

  pub fn task(&self) -> &Arc<dyn Task> {
    &self.task
  }

  pub fn type_name(&self) -> &str {
    self.task.type_name()
  }

  pub fn label(&self) -> &str {
    self.task.label()
  }

  pub fn is_cli_parameter_node(&self) -> bool {
    self.task.cli_parameter().is_some()
  }

  pub fn interfaces(&self) -> &[Interface] {
    &self.interfaces
  }

  pub fn interface(&self, index: usize) -> Option<&Interface> {
    self.interfaces.get(index)
  }

  pub(crate) fn interface_mut(&mut self, index: usize) -> Option<&mut Interface> {
    self.interfaces.get_mut(index)
  }

  pub fn find_interface(&self, name: &str) -> Result<&Interface, FlowError> {
    self
      .interfaces
      .iter()
      .find(|i| i.name() == name)
      .ok_or_else(|| self.missing_interface(name))
  }

  pub fn find_interface_mut(&mut self, name: &str) -> Result<&mut Interface, FlowError> {
    let missing = self.missing_interface(name);
    self
      .interfaces
      .iter_mut()
      .find(|i| i.name() == name)
      .ok_or(missing)
  }

  pub fn interface_ref(&self, name: &str) -> Result<InterfaceRef, FlowError> {
    self.find_interface(name).map(Interface::at)
  }

  pub fn input_interfaces(&self) -> impl Iterator<Item = &Interface> {
    self.interfaces.iter().filter(|i| i.is_input())
  }

  /// Input-like interfaces expecting upstream content rather than a literal.
  pub fn input_slot_interfaces(&self) -> impl Iterator<Item = &Interface> {
    self.input_interfaces().filter(|i| i.slot())
  }

  pub fn output_interfaces(&self) -> impl Iterator<Item = &Interface> {
    self.interfaces.iter().filter(|i| !i.is_input())
  }

  /// Distinct nodes feeding any of this node's interfaces, in first-seen order.
  pub fn predecessor_keys(&self) -> Vec<NodeKey> {
    distinct_nodes(self.interfaces.iter().flat_map(|i| i.predecessors()))
  }

  /// Distinct nodes fed by any of this node's interfaces, in first-seen order.
  pub fn successor_keys(&self) -> Vec<NodeKey> {
    distinct_nodes(self.interfaces.iter().flat_map(|i| i.successors()))
  }

  pub fn graphical_properties(&self) -> &BTreeMap<String, String> {
    &self.graphical_properties
  }

  pub fn graphical_properties_mut(&mut self) -> &mut BTreeMap<String, String> {
    &mut self.graphical_properties
  }

  /// Release temporary resources held by the interfaces.
  pub fn clean(&self) {
    for interface in &self.interfaces {
      interface.clean();
    }
  }

  fn missing_interface(&self, name: &str) -> FlowError {
    FlowError::InterfaceNotFound {
      node_id: self.id.clone(),
      name: name.to_string(),
    }
  }
}

fn distinct_nodes<'a>(refs: impl Iterator<Item = &'a InterfaceRef>) -> Vec<NodeKey> {
  let mut keys = Vec::new();
  for r in refs {
    if !keys.contains(&r.node) {
      keys.push(r.node);
    }
  }
  keys
}

impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}({})", self.task.label(), self.id)
  }
}

impl fmt::Debug for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Node")
      .field("key", &self.key)
      .field("id", &self.id)
      .field("type", &self.task.type_name())
      .field("incidence", &self.incidence)
      .field("interfaces", &self.interfaces)
      .field("graphical_properties", &self.graphical_properties)
      .finish()
  }
}
