//! Persistence of flows as structural XML documents.

mod error;
mod xml;

use std::fs;
use std::path::Path;

use conflux_graph::{Flow, TaskRegistry};
use tracing::info;

pub use error::FormatError;
pub use xml::{export, import};

/// Read a flow from `path`.
pub fn load(path: impl AsRef<Path>, registry: &dyn TaskRegistry) -> Result<Flow, FormatError> {
  let path = path.as_ref();
  info!(path = %path.display(), "loading flow");
  let document = fs::read_to_string(path)?;
  let mut flow = import(&document, registry)?;
  flow.set_filename(Some(path.to_path_buf()));
  flow.set_modified(false);
  Ok(flow)
}

/// Write `flow` to `path`, or to the file it was loaded from or last saved
/// to. Nodes are re-sorted canonically first.
pub fn save(flow: &mut Flow, path: Option<&Path>) -> Result<(), FormatError> {
  let path = match path {
    Some(path) => path.to_path_buf(),
    None => flow.filename().ok_or(FormatError::NoFilename)?.to_path_buf(),
  };

  flow.sort_nodes_by_incidence()?;
  let document = export(flow)?;
  info!(path = %path.display(), nodes = flow.nodes().len(), "saving flow");
  fs::write(&path, document)?;

  flow.set_filename(Some(path));
  flow.set_modified(false);
  Ok(())
}
