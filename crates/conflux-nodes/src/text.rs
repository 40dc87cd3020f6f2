use std::io::Write;

use async_trait::async_trait;
use conflux_graph::{InterfaceKind, InterfaceSpec, Task, TaskError, TaskIo};
use tracing::debug;

/// Splits a text stream into a list of lines.
#[derive(Debug, Clone, Default)]
pub struct Lines;

impl Lines {
  pub const TYPE_NAME: &'static str = "conflux.nodes.Lines";
}

#[async_trait]
impl Task for Lines {
  fn type_name(&self) -> &str {
    Self::TYPE_NAME
  }

  fn label(&self) -> &str {
    "Lines"
  }

  fn category(&self) -> &str {
    "Basic"
  }

  fn description(&self) -> &str {
    "Split text into lines"
  }

  fn interfaces(&self) -> Vec<InterfaceSpec> {
    vec![
      InterfaceSpec::stream("text", InterfaceKind::Input).doc("text to split"),
      InterfaceSpec::list("lines", InterfaceKind::Output).doc("non-empty lines"),
    ]
  }

  async fn run(&self, io: &TaskIo) -> Result<(), TaskError> {
    let text = io.read_stream("text")?;
    let lines: Vec<String> = text
      .lines()
      .filter(|line| !line.is_empty())
      .map(str::to_string)
      .collect();
    debug!(node_id = %io.node_id(), count = lines.len(), "split lines");
    io.set_list("lines", lines)
  }
}

/// Writes its text input to standard output.
#[derive(Debug, Clone, Default)]
pub struct Print;

impl Print {
  pub const TYPE_NAME: &'static str = "conflux.nodes.Print";
}

#[async_trait]
impl Task for Print {
  fn type_name(&self) -> &str {
    Self::TYPE_NAME
  }

  fn label(&self) -> &str {
    "Print"
  }

  fn category(&self) -> &str {
    "Output"
  }

  fn description(&self) -> &str {
    "Write text to standard output"
  }

  fn interfaces(&self) -> Vec<InterfaceSpec> {
    vec![InterfaceSpec::stream("text", InterfaceKind::Input).doc("text to print")]
  }

  async fn run(&self, io: &TaskIo) -> Result<(), TaskError> {
    let text = io.read_stream("text")?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(text.as_bytes())?;
    stdout.flush()?;
    Ok(())
  }
}
