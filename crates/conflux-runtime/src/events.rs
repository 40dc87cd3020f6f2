//! Execution events and notifiers for observability.
//!
//! The runner emits events as a flow run progresses so that callers can
//! follow it, stream it to a UI or simply ignore it.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a flow run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionEvent {
  /// The run has been validated and its nodes spawned.
  RunStarted { run_id: String, node_count: usize },

  /// A node was released and its work started.
  NodeStarted { run_id: String, node_id: String },

  /// A node's work succeeded and its successors were notified.
  NodeCompleted { run_id: String, node_id: String },

  /// A node's work failed.
  NodeFailed {
    run_id: String,
    node_id: String,
    error: String,
  },

  /// A node was cancelled while waiting or running.
  NodeCancelled { run_id: String, node_id: String },

  /// Every node reached a final state.
  RunCompleted { run_id: String, success: bool },
}

/// Receives execution events.
///
/// The runner calls `notify` synchronously from node tasks, so
/// implementations should hand the event off rather than block.
pub trait ExecutionNotifier: Send + Sync {
  fn notify(&self, event: ExecutionEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl ExecutionNotifier for NoopNotifier {
  fn notify(&self, _event: ExecutionEvent) {}
}

/// Sends events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  // Unbounded so a slow consumer never stalls node tasks; volume is a few
  // events per node.
  sender: mpsc::UnboundedSender<ExecutionEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<ExecutionEvent>) -> Self {
    Self { sender }
  }
}

impl ExecutionNotifier for ChannelNotifier {
  fn notify(&self, event: ExecutionEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}
