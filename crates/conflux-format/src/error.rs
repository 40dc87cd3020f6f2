use std::fmt;

use conflux_graph::FlowError;
use thiserror::Error;

/// Errors raised while reading or writing flow documents.
#[derive(Debug, Error)]
pub enum FormatError {
  /// Malformed or structurally invalid document.
  #[error("failed to parse flow document: {message}")]
  Parsing { message: String },

  /// The document names a node type the registry does not know.
  #[error("failed to parse flow document: unknown node type '{type_name}'")]
  UnknownNodeType { type_name: String },

  #[error("flow has no file name to save to")]
  NoFilename,

  #[error(transparent)]
  Flow(#[from] FlowError),

  #[error("xml error: {0}")]
  Xml(#[from] quick_xml::Error),

  #[error("i/o error: {0}")]
  Io(#[from] std::io::Error),
}

impl FormatError {
  pub(crate) fn parsing(message: impl fmt::Display) -> Self {
    Self::Parsing {
      message: message.to_string(),
    }
  }
}
