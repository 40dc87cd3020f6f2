//! The contract a node type satisfies to take part in a flow.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::interface::{Content, ContentCell, InterfaceSpec, InterfaceVariant};

/// Errors raised from a node's work function.
#[derive(Debug, Error)]
pub enum TaskError {
  #[error("node has no interface named '{name}'")]
  UnknownInterface { name: String },

  #[error("interface '{name}' is not a {expected} interface")]
  WrongVariant {
    name: String,
    expected: InterfaceVariant,
  },

  #[error("stream i/o failed: {0}")]
  Io(#[from] std::io::Error),

  #[error("{message}")]
  Failed { message: String },
}

impl TaskError {
  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }
}

/// Behaviour of a node type.
///
/// Interfaces are declared once, up front, by [`Task::interfaces`]; the node
/// built from a task owns exactly that list for its whole life.
#[async_trait]
pub trait Task: Send + Sync {
  /// Fully-qualified type name, used as the registry key when persisting.
  fn type_name(&self) -> &str;

  /// Short human label, also the stem of generated node ids.
  fn label(&self) -> &str;

  fn category(&self) -> &str {
    ""
  }

  fn description(&self) -> &str {
    ""
  }

  fn interfaces(&self) -> Vec<InterfaceSpec>;

  /// Name of the scalar input a CLI-parameter node exposes. Its value must be
  /// supplied by the launcher when the flow leaves it unset and unconnected.
  fn cli_parameter(&self) -> Option<&str> {
    None
  }

  async fn run(&self, io: &TaskIo) -> Result<(), TaskError>;
}

/// Name-addressed access to a node's interface content while it runs.
pub struct TaskIo {
  node_id: String,
  cells: HashMap<String, ContentCell>,
}

impl TaskIo {
  pub fn new(node_id: impl Into<String>, cells: HashMap<String, ContentCell>) -> Self {
    Self {
      node_id: node_id.into(),
      cells,
    }
  }

  pub fn node_id(&self) -> &str {
    &self.node_id
  }

  fn cell(&self, name: &str) -> Result<&ContentCell, TaskError> {
    self.cells.get(name).ok_or_else(|| TaskError::UnknownInterface {
      name: name.to_string(),
    })
  }

  fn wrong(name: &str, expected: InterfaceVariant) -> TaskError {
    TaskError::WrongVariant {
      name: name.to_string(),
      expected,
    }
  }

  pub fn scalar(&self, name: &str) -> Result<Option<Value>, TaskError> {
    match &*self.cell(name)?.lock().unwrap() {
      Content::Scalar(value) => Ok(value.clone()),
      _ => Err(Self::wrong(name, InterfaceVariant::Scalar)),
    }
  }

  pub fn set_scalar(&self, name: &str, value: Option<Value>) -> Result<(), TaskError> {
    match &mut *self.cell(name)?.lock().unwrap() {
      Content::Scalar(current) => {
        *current = value;
        Ok(())
      }
      _ => Err(Self::wrong(name, InterfaceVariant::Scalar)),
    }
  }

  pub fn list(&self, name: &str) -> Result<Vec<String>, TaskError> {
    match &*self.cell(name)?.lock().unwrap() {
      Content::List(items) => Ok(items.clone()),
      _ => Err(Self::wrong(name, InterfaceVariant::List)),
    }
  }

  pub fn set_list(&self, name: &str, items: Vec<String>) -> Result<(), TaskError> {
    match &mut *self.cell(name)?.lock().unwrap() {
      Content::List(current) => {
        *current = items;
        Ok(())
      }
      _ => Err(Self::wrong(name, InterfaceVariant::List)),
    }
  }

  pub fn append_stream(&self, name: &str, data: &[u8]) -> Result<(), TaskError> {
    match &mut *self.cell(name)?.lock().unwrap() {
      Content::Stream(stream) => Ok(stream.append(data)?),
      _ => Err(Self::wrong(name, InterfaceVariant::Stream)),
    }
  }

  /// Read the stream from its cursor to the current end.
  pub fn read_stream(&self, name: &str) -> Result<String, TaskError> {
    match &mut *self.cell(name)?.lock().unwrap() {
      Content::Stream(stream) => Ok(stream.read_to_string()?),
      _ => Err(Self::wrong(name, InterfaceVariant::Stream)),
    }
  }
}
