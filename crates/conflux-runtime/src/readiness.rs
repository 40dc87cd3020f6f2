//! Readiness gates.
//!
//! An [`InterfaceGate`] counts the distinct upstream interfaces that have
//! delivered content to one input. A [`NodeGate`] counts the input-slot
//! interfaces of a node whose own gate has completed and, once all of them
//! have, releases the node's execution unit.
//!
//! Both gates are sized when they are built. Signals from anything outside
//! that set are ignored, and a repeated signal from the same member counts
//! once.

use std::collections::HashSet;
use std::sync::Mutex;

use conflux_graph::{InterfaceRef, Node};
use tokio::sync::watch;

/// Distinct ready predecessors of one input interface.
#[derive(Debug)]
pub struct InterfaceGate {
  expected: HashSet<InterfaceRef>,
  ready: Mutex<HashSet<InterfaceRef>>,
}

impl InterfaceGate {
  pub fn new(predecessors: &[InterfaceRef]) -> Self {
    Self {
      expected: predecessors.iter().copied().collect(),
      ready: Mutex::new(HashSet::with_capacity(predecessors.len())),
    }
  }

  /// Record `from` as ready. Returns `true` only for the signal that
  /// completes the gate.
  pub fn signal(&self, from: InterfaceRef) -> bool {
    if !self.expected.contains(&from) {
      return false;
    }
    let mut ready = self.ready.lock().unwrap();
    ready.insert(from) && ready.len() == self.expected.len()
  }

  pub fn is_ready(&self) -> bool {
    self.ready.lock().unwrap().len() == self.expected.len()
  }

  pub fn expected(&self) -> usize {
    self.expected.len()
  }
}

/// Ready input-slot interfaces of one node plus its one-shot release.
#[derive(Debug)]
pub struct NodeGate {
  required: HashSet<usize>,
  initially_ready: HashSet<usize>,
  ready: Mutex<HashSet<usize>>,
  release: watch::Sender<bool>,
}

impl NodeGate {
  /// Gate over the given interface indices. Indices in `initially_ready`
  /// count as signalled from the start.
  pub fn new(
    required: impl IntoIterator<Item = usize>,
    initially_ready: impl IntoIterator<Item = usize>,
  ) -> Self {
    let required: HashSet<usize> = required.into_iter().collect();
    let initially_ready: HashSet<usize> = initially_ready
      .into_iter()
      .filter(|i| required.contains(i))
      .collect();
    let (release, _) = watch::channel(initially_ready.len() == required.len());

    Self {
      ready: Mutex::new(initially_ready.clone()),
      required,
      initially_ready,
      release,
    }
  }

  /// Gate for a node's input-slot interfaces. Slots without predecessors
  /// have nothing to wait for and start out ready.
  pub fn for_node(node: &Node) -> Self {
    let slots: Vec<_> = node.input_slot_interfaces().collect();
    Self::new(
      slots.iter().map(|i| i.at().index),
      slots
        .iter()
        .filter(|i| i.predecessors().is_empty())
        .map(|i| i.at().index),
    )
  }

  /// Record the interface at `index` as ready. Returns `true` only for the
  /// signal that releases the node.
  pub fn signal(&self, index: usize) -> bool {
    if !self.required.contains(&index) {
      return false;
    }
    let completed = {
      let mut ready = self.ready.lock().unwrap();
      ready.insert(index) && ready.len() == self.required.len()
    };
    if completed {
      self.release();
    }
    completed
  }

  /// Make the node runnable regardless of its slots.
  pub fn release(&self) {
    self.release.send_replace(true);
  }

  pub fn is_runnable(&self) -> bool {
    *self.release.borrow()
  }

  /// Block until the node is released.
  pub async fn wait(&self) {
    let mut released = self.release.subscribe();
    // The sender lives as long as the gate, so this cannot fail while we
    // hold a reference.
    let _ = released.wait_for(|runnable| *runnable).await;
  }

  /// Return to the state the gate was built in.
  pub fn reset(&self) {
    let mut ready = self.ready.lock().unwrap();
    *ready = self.initially_ready.clone();
    self
      .release
      .send_replace(self.initially_ready.len() == self.required.len());
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::Arc;
  use std::time::Duration;

  use conflux_graph::{Flow, Node};
  use conflux_nodes::{Lines, ValueInput};

  fn refs(flow: &Flow, pairs: &[(&str, &str)]) -> Vec<InterfaceRef> {
    pairs
      .iter()
      .map(|(node, name)| flow.find_interface(node, name).unwrap())
      .collect()
  }

  fn two_sources() -> Flow {
    let mut flow = Flow::new();
    flow.add_node(Node::new(ValueInput::default()).with_id("a")).unwrap();
    flow.add_node(Node::new(ValueInput::default()).with_id("b")).unwrap();
    flow.add_node(Node::new(ValueInput::default()).with_id("c")).unwrap();
    flow
  }

  #[test]
  fn test_interface_gate_counts_distinct_predecessors() {
    let flow = two_sources();
    let preds = refs(&flow, &[("a", "out"), ("b", "out")]);
    let gate = InterfaceGate::new(&preds);

    assert!(!gate.signal(preds[0]));
    assert!(!gate.signal(preds[0]));
    assert!(!gate.is_ready());
    assert!(gate.signal(preds[1]));
    assert!(gate.is_ready());
    // Already complete: no second transition.
    assert!(!gate.signal(preds[1]));
  }

  #[test]
  fn test_interface_gate_ignores_strangers() {
    let flow = two_sources();
    let preds = refs(&flow, &[("a", "out"), ("b", "out")]);
    let stranger = flow.find_interface("c", "out").unwrap();
    let gate = InterfaceGate::new(&preds);

    // One predecessor never signals: the stranger cannot make up the count.
    assert!(!gate.signal(preds[0]));
    assert!(!gate.signal(stranger));
    assert!(!gate.is_ready());
    assert_eq!(gate.expected(), 2);
  }

  #[test]
  fn test_node_gate_releases_on_last_slot() {
    let gate = NodeGate::new([0, 2], []);
    assert!(!gate.is_runnable());
    assert!(!gate.signal(0));
    assert!(!gate.signal(1));
    assert!(!gate.is_runnable());
    assert!(gate.signal(2));
    assert!(gate.is_runnable());
  }

  #[test]
  fn test_node_gate_without_slots_is_runnable() {
    let gate = NodeGate::new([], []);
    assert!(gate.is_runnable());

    let gate = NodeGate::for_node(&Node::new(ValueInput::default()));
    assert!(gate.is_runnable());
  }

  #[test]
  fn test_unconnected_slot_counts_as_ready() {
    // Lines has one stream input slot; with no predecessor it starts ready.
    let gate = NodeGate::for_node(&Node::new(Lines));
    assert!(gate.is_runnable());

    let mut flow = two_sources();
    flow.add_node(Node::new(Lines).with_id("lines")).unwrap();
    flow.connect("a", "out", "lines", "text").unwrap();
    let gate = NodeGate::for_node(flow.find_node("lines").unwrap());
    assert!(!gate.is_runnable());
  }

  #[test]
  fn test_node_gate_reset() {
    let gate = NodeGate::new([0, 1], [1]);
    assert!(gate.signal(0));
    gate.reset();
    assert!(!gate.is_runnable());
    assert!(gate.signal(0));
  }

  #[tokio::test]
  async fn test_wait_blocks_until_release() {
    let gate = Arc::new(NodeGate::new([0], []));
    let waiter = {
      let gate = gate.clone();
      tokio::spawn(async move { gate.wait().await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    gate.signal(0);
    tokio::time::timeout(Duration::from_secs(1), waiter)
      .await
      .expect("gate should release the waiter")
      .unwrap();
  }
}
