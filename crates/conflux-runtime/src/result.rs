use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a node's execution unit within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
  Waiting,
  Running,
  Finished,
  Cancelled,
}

impl fmt::Display for NodeState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      NodeState::Waiting => "waiting",
      NodeState::Running => "running",
      NodeState::Finished => "finished",
      NodeState::Cancelled => "cancelled",
    };
    f.write_str(name)
  }
}

/// How a node's turn ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeOutcome {
  Succeeded,
  Failed(String),
  Cancelled,
}

/// Aggregate status of a flow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
  /// Unique run ID.
  pub run_id: String,
  /// Outcome of every node, keyed by node id.
  pub outcomes: BTreeMap<String, NodeOutcome>,
}

impl RunResult {
  /// True when every node succeeded.
  pub fn is_success(&self) -> bool {
    self
      .outcomes
      .values()
      .all(|outcome| *outcome == NodeOutcome::Succeeded)
  }

  pub fn outcome(&self, node_id: &str) -> Option<&NodeOutcome> {
    self.outcomes.get(node_id)
  }

  /// Ids and messages of failed nodes.
  pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
    self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
      NodeOutcome::Failed(message) => Some((id.as_str(), message.as_str())),
      _ => None,
    })
  }
}
