use std::collections::BTreeMap;
use std::sync::Arc;

use crate::node::Node;
use crate::task::Task;

/// Builds a fresh task for a node type.
pub type TaskFactory = Arc<dyn Fn() -> Arc<dyn Task> + Send + Sync>;

/// Maps fully-qualified type names to node constructors.
///
/// Populating a registry (plugin discovery) happens elsewhere; consumers only
/// look names up and never fall back on an unknown one.
pub trait TaskRegistry: Send + Sync {
  /// Construct a node of the given type, or `None` if the name is unknown.
  fn create(&self, type_name: &str) -> Option<Node>;

  /// All registered type names.
  fn type_names(&self) -> Vec<String>;
}

/// In-memory registry filled at process start.
#[derive(Clone, Default)]
pub struct StaticRegistry {
  factories: BTreeMap<String, TaskFactory>,
}

impl StaticRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a factory under an explicit type name.
  pub fn register(
    &mut self,
    type_name: impl Into<String>,
    factory: impl Fn() -> Arc<dyn Task> + Send + Sync + 'static,
  ) -> &mut Self {
    self.factories.insert(type_name.into(), Arc::new(factory));
    self
  }

  /// Register a task type under its own `type_name`.
  pub fn register_default<T>(&mut self) -> &mut Self
  where
    T: Task + Default + 'static,
  {
    let type_name = T::default().type_name().to_string();
    self.register(type_name, || Arc::new(T::default()) as Arc<dyn Task>)
  }

  pub fn contains(&self, type_name: &str) -> bool {
    self.factories.contains_key(type_name)
  }

  pub fn len(&self) -> usize {
    self.factories.len()
  }

  pub fn is_empty(&self) -> bool {
    self.factories.is_empty()
  }
}

impl TaskRegistry for StaticRegistry {
  fn create(&self, type_name: &str) -> Option<Node> {
    self
      .factories
      .get(type_name)
      .map(|factory| Node::from_task(factory()))
  }

  fn type_names(&self) -> Vec<String> {
    self.factories.keys().cloned().collect()
  }
}
