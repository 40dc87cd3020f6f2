use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conflux_graph::{Content, Flow, InterfaceKind, InterfaceSpec, Node, Task, TaskError, TaskIo};
use conflux_nodes::{CliParameter, Lines, ValueInput};
use conflux_runtime::{
  ChannelNotifier, ExecutionEvent, FailurePolicy, NodeOutcome, Runner, RunnerConfig, RuntimeError,
};
use serde_json::json;
use tokio::sync::mpsc;

/// Copies its scalar input to its scalar output.
struct Relay;

#[async_trait]
impl Task for Relay {
  fn type_name(&self) -> &str {
    "tests.Relay"
  }

  fn label(&self) -> &str {
    "Relay"
  }

  fn interfaces(&self) -> Vec<InterfaceSpec> {
    vec![
      InterfaceSpec::scalar("in", InterfaceKind::Input),
      InterfaceSpec::scalar("out", InterfaceKind::Output),
    ]
  }

  async fn run(&self, io: &TaskIo) -> Result<(), TaskError> {
    io.set_scalar("out", io.scalar("in")?)
  }
}

/// Always fails.
struct Fail;

#[async_trait]
impl Task for Fail {
  fn type_name(&self) -> &str {
    "tests.Fail"
  }

  fn label(&self) -> &str {
    "Fail"
  }

  fn interfaces(&self) -> Vec<InterfaceSpec> {
    vec![InterfaceSpec::scalar("out", InterfaceKind::Output)]
  }

  async fn run(&self, _io: &TaskIo) -> Result<(), TaskError> {
    Err(TaskError::failed("boom"))
  }
}

/// Panics inside its work.
struct Explode;

#[async_trait]
impl Task for Explode {
  fn type_name(&self) -> &str {
    "tests.Explode"
  }

  fn label(&self) -> &str {
    "Explode"
  }

  fn interfaces(&self) -> Vec<InterfaceSpec> {
    vec![InterfaceSpec::scalar("out", InterfaceKind::Output)]
  }

  async fn run(&self, _io: &TaskIo) -> Result<(), TaskError> {
    panic!("exploded");
  }
}

/// Sleeps far longer than any test waits.
struct Slow;

#[async_trait]
impl Task for Slow {
  fn type_name(&self) -> &str {
    "tests.Slow"
  }

  fn label(&self) -> &str {
    "Slow"
  }

  fn interfaces(&self) -> Vec<InterfaceSpec> {
    vec![InterfaceSpec::scalar("in", InterfaceKind::Input)]
  }

  async fn run(&self, _io: &TaskIo) -> Result<(), TaskError> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Ok(())
  }
}

fn value(id: &str, literal: &str) -> Node {
  let node = Node::new(ValueInput).with_id(id);
  node
    .find_interface("value")
    .unwrap()
    .set_value(Some(json!(literal)))
    .unwrap();
  node
}

fn stream_is_empty(flow: &Flow, node_id: &str, name: &str) -> bool {
  let node = flow.find_node(node_id).unwrap();
  let interface = node.find_interface(name).unwrap();
  let mut content = interface.content();
  let empty = match &mut *content {
    Content::Stream(stream) => stream.is_empty().unwrap(),
    other => panic!("{name} is not a stream: {other:?}"),
  };
  empty
}

fn drain(receiver: &mut mpsc::UnboundedReceiver<ExecutionEvent>) -> Vec<ExecutionEvent> {
  let mut events = Vec::new();
  while let Ok(event) = receiver.try_recv() {
    events.push(event);
  }
  events
}

fn position(events: &[ExecutionEvent], wanted: impl Fn(&ExecutionEvent) -> bool) -> usize {
  events.iter().position(wanted).expect("event not emitted")
}

#[tokio::test]
async fn test_source_to_sink() {
  let mut flow = Flow::new();
  flow.add_node(value("source", "hello")).unwrap();
  flow.add_node(Node::new(Relay).with_id("sink")).unwrap();
  flow.connect("source", "out", "sink", "in").unwrap();

  let (sender, mut receiver) = mpsc::unbounded_channel();
  let runner = Runner::default().with_notifier(Arc::new(ChannelNotifier::new(sender)));
  let result = runner.run(&flow).await.unwrap();

  assert!(result.is_success());
  let sink = flow.find_node("sink").unwrap();
  assert_eq!(sink.find_interface("in").unwrap().value(), Some(json!("hello")));
  assert_eq!(sink.find_interface("out").unwrap().value(), Some(json!("hello")));

  // Sink must not start before source finished.
  let events = drain(&mut receiver);
  let source_done = position(&events, |e| {
    matches!(e, ExecutionEvent::NodeCompleted { node_id, .. } if node_id == "source")
  });
  let sink_started = position(&events, |e| {
    matches!(e, ExecutionEvent::NodeStarted { node_id, .. } if node_id == "sink")
  });
  assert!(source_done < sink_started);
  assert!(matches!(events.first(), Some(ExecutionEvent::RunStarted { node_count: 2, .. })));
  assert!(matches!(
    events.last(),
    Some(ExecutionEvent::RunCompleted { success: true, .. })
  ));
}

#[tokio::test]
async fn test_stream_fan_in_waits_for_every_predecessor() {
  let mut flow = Flow::new();
  flow.add_node(value("a", "alpha")).unwrap();
  flow.add_node(value("b", "beta")).unwrap();
  flow.add_node(Node::new(Lines).with_id("lines")).unwrap();
  flow.connect("a", "out", "lines", "text").unwrap();
  flow.connect("b", "out", "lines", "text").unwrap();

  let result = Runner::default().run(&flow).await.unwrap();
  assert!(result.is_success());

  let mut lines = flow
    .find_node("lines")
    .unwrap()
    .find_interface("lines")
    .unwrap()
    .items()
    .unwrap();
  lines.sort();
  assert_eq!(lines, vec!["alpha".to_string(), "beta".to_string()]);
}

#[tokio::test]
async fn test_diamond_runs_join_last() {
  let mut flow = Flow::new();
  flow.add_node(value("a", "x")).unwrap();
  flow.add_node(Node::new(Relay).with_id("b")).unwrap();
  flow.add_node(Node::new(Relay).with_id("c")).unwrap();
  flow.add_node(Node::new(Lines).with_id("d")).unwrap();
  flow.connect("a", "out", "b", "in").unwrap();
  flow.connect("a", "out", "c", "in").unwrap();
  flow.connect("b", "out", "d", "text").unwrap();
  flow.connect("c", "out", "d", "text").unwrap();

  let (sender, mut receiver) = mpsc::unbounded_channel();
  let runner = Runner::default().with_notifier(Arc::new(ChannelNotifier::new(sender)));
  runner.run(&flow).await.unwrap();

  let events = drain(&mut receiver);
  let d_started = position(&events, |e| {
    matches!(e, ExecutionEvent::NodeStarted { node_id, .. } if node_id == "d")
  });
  for upstream in ["b", "c"] {
    let done = position(&events, |e| {
      matches!(e, ExecutionEvent::NodeCompleted { node_id, .. } if node_id == upstream)
    });
    assert!(done < d_started);
  }
  assert_eq!(
    flow.find_node("d").unwrap().find_interface("lines").unwrap().items(),
    Some(vec!["x".to_string(), "x".to_string()])
  );
}

/// A failed node still hands its (unchanged) outputs to its successors under
/// the default policy, and the run reports the failure instead of aborting.
#[tokio::test]
async fn test_failed_node_still_notifies_successors() {
  let mut flow = Flow::new();
  flow.add_node(Node::new(Fail).with_id("fail")).unwrap();
  flow.add_node(Node::new(Relay).with_id("after")).unwrap();
  flow.connect("fail", "out", "after", "in").unwrap();

  let result = Runner::default().run(&flow).await.unwrap();

  assert!(!result.is_success());
  assert_eq!(
    result.outcome("fail"),
    Some(&NodeOutcome::Failed("boom".to_string()))
  );
  assert_eq!(result.outcome("after"), Some(&NodeOutcome::Succeeded));
  assert_eq!(result.failures().collect::<Vec<_>>(), vec![("fail", "boom")]);
}

#[tokio::test]
async fn test_halt_policy_cancels_remaining_nodes() {
  let mut flow = Flow::new();
  flow.add_node(Node::new(Fail).with_id("fail")).unwrap();
  flow.add_node(Node::new(Slow).with_id("downstream")).unwrap();
  flow.add_node(Node::new(Slow).with_id("independent")).unwrap();
  flow.connect("fail", "out", "downstream", "in").unwrap();

  let runner = Runner::new(RunnerConfig {
    failure_policy: FailurePolicy::Halt,
  });
  let result = tokio::time::timeout(Duration::from_secs(5), runner.run(&flow))
    .await
    .expect("halted run should finish promptly")
    .unwrap();

  assert!(matches!(result.outcome("fail"), Some(NodeOutcome::Failed(_))));
  assert_eq!(result.outcome("downstream"), Some(&NodeOutcome::Cancelled));
  assert_eq!(result.outcome("independent"), Some(&NodeOutcome::Cancelled));
  assert!(!runner.is_stopped());
}

#[tokio::test]
async fn test_stop_cancels_run() {
  let mut flow = Flow::new();
  flow.add_node(Node::new(Slow).with_id("slow")).unwrap();

  let runner = Arc::new(Runner::default());
  let stopper = {
    let runner = runner.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(50)).await;
      runner.stop();
    })
  };

  let outcome = tokio::time::timeout(Duration::from_secs(5), runner.run(&flow))
    .await
    .expect("stopped run should finish promptly");
  assert!(matches!(outcome, Err(RuntimeError::Cancelled)));
  stopper.await.unwrap();

  // A stopped runner refuses new runs.
  assert!(matches!(runner.run(&flow).await, Err(RuntimeError::Cancelled)));
}

#[tokio::test]
async fn test_cycle_is_rejected_before_running() {
  let mut flow = Flow::new();
  flow.add_node(Node::new(Relay).with_id("a")).unwrap();
  flow.add_node(Node::new(Relay).with_id("b")).unwrap();
  flow.connect("a", "out", "b", "in").unwrap();
  flow.connect("b", "out", "a", "in").unwrap();

  let err = Runner::default().run(&flow).await.unwrap_err();
  assert!(matches!(err, RuntimeError::InvalidGraph { .. }));
}

#[tokio::test]
async fn test_missing_cli_parameter() {
  let mut flow = Flow::new();
  flow.add_node(Node::new(CliParameter).with_id("name")).unwrap();
  flow.add_node(Node::new(Relay).with_id("sink")).unwrap();
  flow.connect("name", "out", "sink", "in").unwrap();

  let runner = Runner::default();
  let err = runner.run(&flow).await.unwrap_err();
  assert!(matches!(
    err,
    RuntimeError::MissingParameter { ref node_id, ref interface }
      if node_id == "name" && interface == "value"
  ));

  flow
    .apply_cli_arguments(&HashMap::from([("name".to_string(), "world".to_string())]))
    .unwrap();
  let result = runner.run(&flow).await.unwrap();
  assert!(result.is_success());
  assert_eq!(
    flow.find_node("sink").unwrap().find_interface("in").unwrap().value(),
    Some(json!("world"))
  );
}

#[tokio::test]
async fn test_panicking_node_fails_and_successors_run() {
  let mut flow = Flow::new();
  flow.add_node(Node::new(Explode).with_id("explode")).unwrap();
  flow.add_node(Node::new(Relay).with_id("after")).unwrap();
  flow.connect("explode", "out", "after", "in").unwrap();

  let result = tokio::time::timeout(Duration::from_secs(5), Runner::default().run(&flow))
    .await
    .expect("a panic must not stall the run")
    .unwrap();

  assert_eq!(
    result.outcome("explode"),
    Some(&NodeOutcome::Failed("node work panicked".to_string()))
  );
  assert_eq!(result.outcome("after"), Some(&NodeOutcome::Succeeded));
}

#[tokio::test]
async fn test_streams_are_cleaned_after_every_run() {
  for policy in [FailurePolicy::Continue, FailurePolicy::Halt] {
    let mut flow = Flow::new();
    flow.add_node(value("source", "alpha")).unwrap();
    flow.add_node(Node::new(Lines).with_id("lines")).unwrap();
    flow.add_node(Node::new(Fail).with_id("fail")).unwrap();
    flow.connect("source", "out", "lines", "text").unwrap();

    let runner = Runner::new(RunnerConfig {
      failure_policy: policy,
    });
    let result = runner.run(&flow).await.unwrap();

    assert!(!result.is_success(), "{policy:?}");
    assert!(stream_is_empty(&flow, "lines", "text"), "{policy:?}");
  }

  // Under the continue policy the stream was filled before cleanup.
  let mut flow = Flow::new();
  flow.add_node(value("source", "alpha")).unwrap();
  flow.add_node(Node::new(Lines).with_id("lines")).unwrap();
  flow.connect("source", "out", "lines", "text").unwrap();
  Runner::default().run(&flow).await.unwrap();
  assert_eq!(
    flow.find_node("lines").unwrap().find_interface("lines").unwrap().items(),
    Some(vec!["alpha".to_string()])
  );
  assert!(stream_is_empty(&flow, "lines", "text"));
}
