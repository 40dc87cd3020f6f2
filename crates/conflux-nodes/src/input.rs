use async_trait::async_trait;
use conflux_graph::{InterfaceKind, InterfaceSpec, Task, TaskError, TaskIo};
use tracing::debug;

/// Emits a manually entered string or number.
#[derive(Debug, Clone, Default)]
pub struct ValueInput;

impl ValueInput {
  pub const TYPE_NAME: &'static str = "conflux.nodes.ValueInput";
}

#[async_trait]
impl Task for ValueInput {
  fn type_name(&self) -> &str {
    Self::TYPE_NAME
  }

  fn label(&self) -> &str {
    "Value"
  }

  fn category(&self) -> &str {
    "Input"
  }

  fn description(&self) -> &str {
    "A string or number"
  }

  fn interfaces(&self) -> Vec<InterfaceSpec> {
    vec![
      InterfaceSpec::scalar("value", InterfaceKind::Parameter)
        .slot(false)
        .default_value("")
        .doc("Manual value"),
      InterfaceSpec::scalar("out", InterfaceKind::Output)
        .default_value("")
        .doc("value"),
    ]
  }

  async fn run(&self, io: &TaskIo) -> Result<(), TaskError> {
    let value = io.scalar("value")?;
    debug!(node_id = %io.node_id(), value = ?value, "emitting value");
    io.set_scalar("out", value)
  }
}

/// Emits a value supplied on the command line when the flow is launched.
///
/// The `value` parameter has no default, so a launcher must provide it unless
/// it is connected upstream.
#[derive(Debug, Clone, Default)]
pub struct CliParameter;

impl CliParameter {
  pub const TYPE_NAME: &'static str = "conflux.nodes.CliParameter";
}

#[async_trait]
impl Task for CliParameter {
  fn type_name(&self) -> &str {
    Self::TYPE_NAME
  }

  fn label(&self) -> &str {
    "Parameter"
  }

  fn category(&self) -> &str {
    "Input"
  }

  fn description(&self) -> &str {
    "A value given on the command line"
  }

  fn interfaces(&self) -> Vec<InterfaceSpec> {
    vec![
      InterfaceSpec::scalar("value", InterfaceKind::Parameter)
        .slot(false)
        .doc("Command-line value"),
      InterfaceSpec::scalar("out", InterfaceKind::Output).doc("value"),
    ]
  }

  fn cli_parameter(&self) -> Option<&str> {
    Some("value")
  }

  async fn run(&self, io: &TaskIo) -> Result<(), TaskError> {
    match io.scalar("value")? {
      Some(value) => io.set_scalar("out", Some(value)),
      None => Err(TaskError::failed("no value supplied for command-line parameter")),
    }
  }
}
