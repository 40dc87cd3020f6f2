//! Flow graph model for conflux.
//!
//! A [`Flow`] is a set of [`Node`]s, each running one [`Task`], wired together
//! through typed [`Interface`]s. This crate owns the structure and the content
//! merge rules; running a flow lives in `conflux-runtime` and persisting it in
//! `conflux-format`.

mod error;
mod flow;
mod graph;
mod interface;
mod node;
mod registry;
mod stream;
mod task;

pub use error::FlowError;
pub use flow::Flow;
pub use graph::Graph;
pub use interface::{
  Content, ContentCell, Interface, InterfaceKind, InterfaceRef, InterfaceSpec, InterfaceVariant,
  NodeKey, render_scalar,
};
pub use node::Node;
pub use registry::{StaticRegistry, TaskFactory, TaskRegistry};
pub use stream::{DEFAULT_SPOOL_THRESHOLD, StreamBuffer};
pub use task::{Task, TaskError, TaskIo};
