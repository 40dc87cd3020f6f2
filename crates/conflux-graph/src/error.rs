use thiserror::Error;

/// Errors raised by graph mutation, lookups and content merges.
#[derive(Debug, Error)]
pub enum FlowError {
  #[error("node not found: {node_id}")]
  NodeNotFound { node_id: String },

  #[error("interface '{name}' not found on node {node_id}")]
  InterfaceNotFound { node_id: String, name: String },

  #[error("a node with id '{node_id}' already exists")]
  DuplicateId { node_id: String },

  #[error("node '{node_id}' is already part of this flow")]
  DuplicateNode { node_id: String },

  /// The node was taken from a flow without severing its connectors first.
  #[error("node '{node_id}' carries connectors to nodes outside this flow")]
  ForeignConnectors { node_id: String },

  #[error("connector already exists from {from} to {to}")]
  DuplicateEdge { from: String, to: String },

  #[error("connector does not exist from {from} to {to}")]
  EdgeNotFound { from: String, to: String },

  /// Carries both ends of the rejected connection, upstream first.
  #[error("{upstream} incompatible with {downstream}")]
  Incompatible { upstream: String, downstream: String },

  #[error("{interface} should not load {other}: interfaces are not connected")]
  NotConnected { interface: String, other: String },

  #[error("{interface} does not carry a {expected} value")]
  VariantMismatch { interface: String, expected: String },

  #[error("node '{node_id}' is not a command-line parameter node")]
  NotCliParameter { node_id: String },

  #[error("flow contains a cycle through nodes: {}", nodes.join(", "))]
  Cycle { nodes: Vec<String> },

  #[error("stream buffer error: {0}")]
  Stream(#[from] std::io::Error),
}
