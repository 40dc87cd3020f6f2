//! Built-in node types.

mod input;
mod text;

pub use input::{CliParameter, ValueInput};
pub use text::{Lines, Print};

use conflux_graph::StaticRegistry;

/// Registry holding every built-in node type.
pub fn registry() -> StaticRegistry {
  let mut registry = StaticRegistry::new();
  registry
    .register_default::<ValueInput>()
    .register_default::<CliParameter>()
    .register_default::<Lines>()
    .register_default::<Print>();
  registry
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  use conflux_graph::{Node, TaskIo, TaskRegistry};
  use serde_json::json;

  fn io_for(node: &Node) -> TaskIo {
    let cells: HashMap<_, _> = node
      .interfaces()
      .iter()
      .map(|i| (i.name().to_string(), i.content_cell()))
      .collect();
    TaskIo::new(node.id(), cells)
  }

  #[test]
  fn test_registry_contains_builtins() {
    let registry = registry();
    assert_eq!(registry.len(), 4);
    for name in [
      ValueInput::TYPE_NAME,
      CliParameter::TYPE_NAME,
      Lines::TYPE_NAME,
      Print::TYPE_NAME,
    ] {
      let node = registry.create(name).unwrap();
      assert_eq!(node.type_name(), name);
    }
    assert!(registry.create("conflux.nodes.Missing").is_none());
  }

  #[tokio::test]
  async fn test_value_input_copies_value() {
    let node = Node::new(ValueInput);
    node
      .find_interface("value")
      .unwrap()
      .set_value(Some(json!("hello")))
      .unwrap();

    node.task().run(&io_for(&node)).await.unwrap();
    assert_eq!(node.find_interface("out").unwrap().value(), Some(json!("hello")));
  }

  #[tokio::test]
  async fn test_value_input_defaults_to_empty_string() {
    let node = Node::new(ValueInput);
    node.task().run(&io_for(&node)).await.unwrap();
    assert_eq!(node.find_interface("out").unwrap().value(), Some(json!("")));
  }

  #[tokio::test]
  async fn test_cli_parameter_requires_value() {
    let node = Node::new(CliParameter);
    assert!(node.is_cli_parameter_node());
    assert!(node.task().run(&io_for(&node)).await.is_err());

    node
      .find_interface("value")
      .unwrap()
      .set_value(Some(json!("42")))
      .unwrap();
    node.task().run(&io_for(&node)).await.unwrap();
    assert_eq!(node.find_interface("out").unwrap().value(), Some(json!("42")));
  }

  #[tokio::test]
  async fn test_lines_splits_stream() {
    let node = Node::new(Lines);
    let io = io_for(&node);
    io.append_stream("text", b"first\n\nsecond\nthird").unwrap();

    node.task().run(&io).await.unwrap();
    assert_eq!(
      node.find_interface("lines").unwrap().items(),
      Some(vec![
        "first".to_string(),
        "second".to_string(),
        "third".to_string()
      ])
    );
  }
}
