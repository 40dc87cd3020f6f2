//! Runtime errors.

use conflux_graph::FlowError;

/// Errors that prevent a flow run from starting or completing.
///
/// A failing node is not one of them: node failures are reported per node in
/// the [`RunResult`](crate::RunResult).
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
  /// The flow cannot be scheduled.
  #[error("invalid flow graph: {message}")]
  InvalidGraph { message: String },

  /// A command-line parameter node has no value and no upstream connection.
  #[error("missing value for parameter '{interface}' of node '{node_id}'")]
  MissingParameter { node_id: String, interface: String },

  /// The runner was stopped.
  #[error("run cancelled")]
  Cancelled,

  #[error(transparent)]
  Flow(#[from] FlowError),
}
