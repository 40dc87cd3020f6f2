//! Concurrent flow runner.
//!
//! Every node of a flow gets its own task. A node waits until each of its
//! input-slot interfaces has received content from all of its predecessors,
//! runs its work and then hands its outputs on to its successors.

mod error;
mod events;
mod execution;
mod readiness;
mod result;
mod runner;

pub use error::RuntimeError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use readiness::{InterfaceGate, NodeGate};
pub use result::{NodeOutcome, NodeState, RunResult};
pub use runner::{FailurePolicy, Runner, RunnerConfig};
