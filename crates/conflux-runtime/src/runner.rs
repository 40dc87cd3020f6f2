//! Flow runner.
//!
//! The `Runner` spawns one task per node, releases the nodes without
//! predecessors and waits for every node to finish its turn.

use std::collections::BTreeMap;
use std::sync::Arc;

use conflux_graph::Flow;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::RuntimeError;
use crate::events::{ExecutionEvent, ExecutionNotifier, NoopNotifier};
use crate::execution::RunState;
use crate::result::{NodeOutcome, RunResult};

/// What happens to the rest of the run when a node's work fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
  /// Log the failure and notify successors as if the node had succeeded.
  #[default]
  Continue,
  /// Cancel every node that has not finished yet.
  Halt,
}

/// Configuration for the runner.
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
  pub failure_policy: FailurePolicy,
}

/// Runs flows.
///
/// # Usage
///
/// ```ignore
/// let runner = Runner::new(RunnerConfig::default());
/// let result = runner.run(&flow).await?;
/// assert!(result.is_success());
/// ```
pub struct Runner {
  config: RunnerConfig,
  notifier: Arc<dyn ExecutionNotifier>,
  cancel: CancellationToken,
}

impl Default for Runner {
  fn default() -> Self {
    Self::new(RunnerConfig::default())
  }
}

impl Runner {
  pub fn new(config: RunnerConfig) -> Self {
    Self {
      config,
      notifier: Arc::new(NoopNotifier),
      cancel: CancellationToken::new(),
    }
  }

  /// Route execution events to `notifier`.
  pub fn with_notifier(mut self, notifier: Arc<dyn ExecutionNotifier>) -> Self {
    self.notifier = notifier;
    self
  }

  pub fn config(&self) -> &RunnerConfig {
    &self.config
  }

  /// Cancel every run in progress and refuse new ones.
  ///
  /// Waiting nodes end immediately. A running node is interrupted at its
  /// next await point; work that never yields runs to completion.
  pub fn stop(&self) {
    info!("stopping runner");
    self.cancel.cancel();
  }

  pub fn is_stopped(&self) -> bool {
    self.cancel.is_cancelled()
  }

  /// Check that `flow` can be run: it must be acyclic and every
  /// command-line parameter must have a value or an upstream connection.
  pub fn validate(&self, flow: &Flow) -> Result<(), RuntimeError> {
    flow.incidences().map_err(|e| RuntimeError::InvalidGraph {
      message: e.to_string(),
    })?;

    if let Some(node_id) = flow.missing_cli_parameters().into_iter().next() {
      let interface = flow
        .find_node(&node_id)?
        .task()
        .cli_parameter()
        .unwrap_or_default()
        .to_string();
      return Err(RuntimeError::MissingParameter { node_id, interface });
    }
    Ok(())
  }

  /// Run `flow` to completion.
  ///
  /// The run works on a shallow clone, so content produced by the nodes is
  /// visible through `flow` afterwards. Stream buffers are released once all
  /// nodes are done, whatever their outcome.
  #[instrument(name = "flow_run", skip(self, flow), fields(nodes = flow.nodes().len()))]
  pub async fn run(&self, flow: &Flow) -> Result<RunResult, RuntimeError> {
    self.validate(flow)?;
    if self.cancel.is_cancelled() {
      return Err(RuntimeError::Cancelled);
    }

    let run_id = Uuid::new_v4().to_string();
    let state = Arc::new(RunState::new(
      run_id.clone(),
      flow.clone(),
      self.config.failure_policy,
      self.notifier.clone(),
      self.cancel.child_token(),
    ));

    info!(run_id = %run_id, policy = ?self.config.failure_policy, "run_started");
    self.notifier.notify(ExecutionEvent::RunStarted {
      run_id: run_id.clone(),
      node_count: flow.nodes().len(),
    });

    state.release_start_nodes();
    let (node_ids, handles): (Vec<String>, Vec<_>) = state
      .flow()
      .nodes()
      .iter()
      .map(|node| {
        let unit = state.clone().execute(node.key());
        (node.id().to_string(), tokio::spawn(unit))
      })
      .unzip();

    let joined = join_all(handles).await;
    let outcomes: BTreeMap<String, NodeOutcome> = node_ids
      .into_iter()
      .zip(joined)
      .map(|(node_id, joined)| {
        let outcome =
          joined.unwrap_or_else(|e| NodeOutcome::Failed(format!("node task aborted: {}", e)));
        (node_id, outcome)
      })
      .collect();

    state.flow().clean();

    if self.cancel.is_cancelled() {
      warn!(run_id = %run_id, "run cancelled");
      return Err(RuntimeError::Cancelled);
    }

    let result = RunResult { run_id, outcomes };
    let success = result.is_success();
    info!(run_id = %result.run_id, success, "run_completed");
    self.notifier.notify(ExecutionEvent::RunCompleted {
      run_id: result.run_id.clone(),
      success,
    });
    Ok(result)
  }
}
