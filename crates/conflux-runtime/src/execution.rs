//! Per-run execution state and node execution units.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use conflux_graph::{Flow, InterfaceRef, Node, NodeKey, TaskIo};
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::events::{ExecutionEvent, ExecutionNotifier};
use crate::readiness::{InterfaceGate, NodeGate};
use crate::result::{NodeOutcome, NodeState};
use crate::runner::FailurePolicy;

/// Everything one run of a flow shares between its node units.
///
/// Built fresh for every run from a shallow clone of the flow, so gates
/// never carry over from a previous run.
pub(crate) struct RunState {
  run_id: String,
  flow: Flow,
  node_gates: HashMap<NodeKey, NodeGate>,
  interface_gates: HashMap<InterfaceRef, InterfaceGate>,
  policy: FailurePolicy,
  notifier: Arc<dyn ExecutionNotifier>,
  cancel: CancellationToken,
}

impl RunState {
  pub(crate) fn new(
    run_id: String,
    flow: Flow,
    policy: FailurePolicy,
    notifier: Arc<dyn ExecutionNotifier>,
    cancel: CancellationToken,
  ) -> Self {
    let mut node_gates = HashMap::with_capacity(flow.nodes().len());
    let mut interface_gates = HashMap::new();

    for node in flow.nodes() {
      node_gates.insert(node.key(), NodeGate::for_node(node));
      for interface in node.input_interfaces() {
        if !interface.predecessors().is_empty() {
          interface_gates.insert(interface.at(), InterfaceGate::new(interface.predecessors()));
        }
      }
    }

    Self {
      run_id,
      flow,
      node_gates,
      interface_gates,
      policy,
      notifier,
      cancel,
    }
  }

  pub(crate) fn flow(&self) -> &Flow {
    &self.flow
  }

  fn transition(&self, node: &Node, state: NodeState) {
    debug!(run_id = %self.run_id, node = %node, state = %state, "node state changed");
  }

  fn node_id(&self, key: NodeKey) -> &str {
    self.flow.node(key).map(Node::id).unwrap_or_default()
  }

  /// Release every node with no predecessor node.
  pub(crate) fn release_start_nodes(&self) {
    for node in self.flow.start_nodes() {
      if let Some(gate) = self.node_gates.get(&node.key()) {
        gate.release();
      }
    }
  }

  /// Upstream interface `from` has content for `to`: merge it, then count
  /// `from` as ready on `to` and, if that completes `to`, on its node.
  fn content_ready(&self, to: InterfaceRef, from: InterfaceRef) {
    let (Some(target), Some(source)) = (self.flow.interface(to), self.flow.interface(from)) else {
      return;
    };

    if let Err(e) = target.load(source) {
      error!(interface = %target, from = %source, error = %e, "failed to load upstream content");
    }

    let interface_ready = self
      .interface_gates
      .get(&to)
      .is_some_and(|gate| gate.signal(from));
    if !interface_ready {
      return;
    }
    debug!(interface = %target, "interface ready");

    if let Some(gate) = self.node_gates.get(&to.node) {
      if gate.signal(to.index) {
        debug!(node_id = %self.node_id(to.node), "node runnable");
      }
    }
  }

  fn notify(&self, event: ExecutionEvent) {
    self.notifier.notify(event);
  }

  fn cancelled(&self, node: &Node) -> NodeOutcome {
    info!(node = %node, "node_cancelled");
    self.transition(node, NodeState::Cancelled);
    self.notify(ExecutionEvent::NodeCancelled {
      run_id: self.run_id.clone(),
      node_id: node.id().to_string(),
    });
    NodeOutcome::Cancelled
  }

  /// Execution unit of one node: wait for release, run the work, notify
  /// successors.
  #[instrument(
    name = "node_execute",
    skip(self),
    fields(run_id = %self.run_id, node_id = %self.node_id(key))
  )]
  pub(crate) async fn execute(self: Arc<Self>, key: NodeKey) -> NodeOutcome {
    let (Some(node), Some(gate)) = (self.flow.node(key), self.node_gates.get(&key)) else {
      return NodeOutcome::Failed(format!("node {:?} is not part of this run", key));
    };

    self.transition(node, NodeState::Waiting);
    tokio::select! {
      _ = gate.wait() => {}
      _ = self.cancel.cancelled() => return self.cancelled(node),
    }
    gate.reset();

    self.transition(node, NodeState::Running);
    info!(node = %node, "node_started");
    self.notify(ExecutionEvent::NodeStarted {
      run_id: self.run_id.clone(),
      node_id: node.id().to_string(),
    });

    let io = task_io(node);
    let work = AssertUnwindSafe(node.task().run(&io)).catch_unwind();
    let result = tokio::select! {
      result = work => result,
      _ = self.cancel.cancelled() => return self.cancelled(node),
    };

    let outcome = match result {
      Ok(Ok(())) => NodeOutcome::Succeeded,
      Ok(Err(e)) => NodeOutcome::Failed(e.to_string()),
      Err(_) => NodeOutcome::Failed("node work panicked".to_string()),
    };

    self.transition(node, NodeState::Finished);
    match &outcome {
      NodeOutcome::Failed(message) => {
        error!(node = %node, error = %message, "node_failed");
        self.notify(ExecutionEvent::NodeFailed {
          run_id: self.run_id.clone(),
          node_id: node.id().to_string(),
          error: message.clone(),
        });
        if self.policy == FailurePolicy::Halt {
          self.cancel.cancel();
          return outcome;
        }
      }
      _ => {
        info!(node = %node, "node_completed");
        self.notify(ExecutionEvent::NodeCompleted {
          run_id: self.run_id.clone(),
          node_id: node.id().to_string(),
        });
      }
    }

    // Successors are notified even after a failure under the continue policy.
    for interface in node.output_interfaces() {
      for successor in interface.successors() {
        self.content_ready(*successor, interface.at());
      }
    }

    outcome
  }
}

fn task_io(node: &Node) -> TaskIo {
  let cells = node
    .interfaces()
    .iter()
    .map(|i| (i.name().to_string(), i.content_cell()))
    .collect();
  TaskIo::new(node.id(), cells)
}
