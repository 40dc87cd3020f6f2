//! Interface type system.
//!
//! An interface is a named attachment point on a node. Its kind gives the
//! direction (Parameter and Input consume, Result and Output produce) and its
//! variant decides which content it carries and how upstream content is
//! merged into it.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::FlowError;
use crate::stream::StreamBuffer;

/// Role of an interface on its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
  Parameter,
  Input,
  Result,
  Output,
}

impl InterfaceKind {
  /// Parameter and Input consume content; Result and Output produce it.
  pub fn is_input(self) -> bool {
    matches!(self, InterfaceKind::Parameter | InterfaceKind::Input)
  }
}

/// Content carried by an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceVariant {
  Scalar,
  Stream,
  List,
}

impl InterfaceVariant {
  /// Whether an interface of this variant can absorb `upstream` content.
  /// A stream absorbs any variant; scalars and lists only their own.
  pub fn accepts(self, upstream: InterfaceVariant) -> bool {
    match (self, upstream) {
      (InterfaceVariant::Stream, _) => true,
      (InterfaceVariant::Scalar, InterfaceVariant::Scalar) => true,
      (InterfaceVariant::List, InterfaceVariant::List) => true,
      _ => false,
    }
  }

  fn type_label(self) -> &'static str {
    match self {
      InterfaceVariant::Scalar => "ScalarInterface",
      InterfaceVariant::Stream => "StreamInterface",
      InterfaceVariant::List => "ListInterface",
    }
  }
}

impl fmt::Display for InterfaceVariant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      InterfaceVariant::Scalar => "scalar",
      InterfaceVariant::Stream => "stream",
      InterfaceVariant::List => "list",
    };
    f.write_str(name)
  }
}

/// Process-unique identity of a node, independent of its (renamable) id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey(u64);

impl NodeKey {
  pub(crate) fn next() -> Self {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    Self(NEXT.fetch_add(1, Ordering::Relaxed))
  }
}

/// Address of an interface: owning node plus position in its declared list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceRef {
  pub node: NodeKey,
  pub index: usize,
}

/// Declaration of one interface, as listed by a node type.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceSpec {
  pub name: String,
  pub kind: InterfaceKind,
  pub variant: InterfaceVariant,
  pub slot: bool,
  pub default: Option<Value>,
  pub doc: String,
}

impl InterfaceSpec {
  pub fn new(name: impl Into<String>, kind: InterfaceKind, variant: InterfaceVariant) -> Self {
    Self {
      name: name.into(),
      kind,
      variant,
      slot: true,
      default: None,
      doc: String::new(),
    }
  }

  pub fn scalar(name: impl Into<String>, kind: InterfaceKind) -> Self {
    Self::new(name, kind, InterfaceVariant::Scalar)
  }

  pub fn stream(name: impl Into<String>, kind: InterfaceKind) -> Self {
    Self::new(name, kind, InterfaceVariant::Stream)
  }

  pub fn list(name: impl Into<String>, kind: InterfaceKind) -> Self {
    Self::new(name, kind, InterfaceVariant::List)
  }

  pub fn slot(mut self, slot: bool) -> Self {
    self.slot = slot;
    self
  }

  pub fn default_value(mut self, value: impl Into<Value>) -> Self {
    self.default = Some(value.into());
    self
  }

  pub fn doc(mut self, doc: impl Into<String>) -> Self {
    self.doc = doc.into();
    self
  }
}

/// Live content of an interface.
#[derive(Debug)]
pub enum Content {
  Scalar(Option<Value>),
  Stream(StreamBuffer),
  List(Vec<String>),
}

/// Detached copy of an upstream interface's content, taken before merging so
/// that no two content locks are ever held at once.
enum Payload {
  Scalar(Option<Value>),
  Bytes(Vec<u8>),
  List(Vec<String>),
}

impl Content {
  fn for_spec(spec: &InterfaceSpec) -> Self {
    match spec.variant {
      InterfaceVariant::Scalar => Content::Scalar(spec.default.clone()),
      InterfaceVariant::Stream => Content::Stream(StreamBuffer::new()),
      InterfaceVariant::List => Content::List(Vec::new()),
    }
  }

  pub fn variant(&self) -> InterfaceVariant {
    match self {
      Content::Scalar(_) => InterfaceVariant::Scalar,
      Content::Stream(_) => InterfaceVariant::Stream,
      Content::List(_) => InterfaceVariant::List,
    }
  }

  fn snapshot(&mut self) -> io::Result<Payload> {
    Ok(match self {
      Content::Scalar(value) => Payload::Scalar(value.clone()),
      Content::Stream(stream) => Payload::Bytes(stream.contents()?),
      Content::List(items) => Payload::List(items.clone()),
    })
  }

  /// Free temporary resources. Only streams hold any.
  pub fn clean(&mut self) {
    if let Content::Stream(stream) = self {
      stream.close();
    }
  }
}

/// Shared handle on interface content. Clones of a flow share it.
pub type ContentCell = Arc<Mutex<Content>>;

/// Textual form of a scalar value: strings unquoted, null as empty.
pub fn render_scalar(value: Option<&Value>) -> String {
  match value {
    None | Some(Value::Null) => String::new(),
    Some(Value::String(s)) => s.clone(),
    Some(other) => other.to_string(),
  }
}

/// A named attachment point on exactly one node.
#[derive(Debug, Clone)]
pub struct Interface {
  at: InterfaceRef,
  owner: String,
  name: String,
  kind: InterfaceKind,
  variant: InterfaceVariant,
  slot: bool,
  default: Option<Value>,
  doc: String,
  content: ContentCell,
  successors: Vec<InterfaceRef>,
  predecessors: Vec<InterfaceRef>,
}

impl Interface {
  pub(crate) fn from_spec(at: InterfaceRef, owner: &str, spec: InterfaceSpec) -> Self {
    let content = Content::for_spec(&spec);
    Self {
      at,
      owner: owner.to_string(),
      name: spec.name,
      kind: spec.kind,
      variant: spec.variant,
      slot: spec.slot,
      default: spec.default,
      doc: spec.doc,
      content: Arc::new(Mutex::new(content)),
      successors: Vec::new(),
      predecessors: Vec::new(),
    }
  }

  pub fn at(&self) -> InterfaceRef {
    self.at
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn kind(&self) -> InterfaceKind {
    self.kind
  }

  pub fn variant(&self) -> InterfaceVariant {
    self.variant
  }

  pub fn doc(&self) -> &str {
    &self.doc
  }

  pub fn default_value(&self) -> Option<&Value> {
    self.default.as_ref()
  }

  pub fn is_input(&self) -> bool {
    self.kind.is_input()
  }

  /// Scalar interfaces are the only ones holding a literal value.
  pub fn is_value(&self) -> bool {
    self.variant == InterfaceVariant::Scalar
  }

  /// True when content arrives from upstream, false for a literal.
  pub fn slot(&self) -> bool {
    self.slot
  }

  pub fn set_slot(&mut self, slot: bool) {
    self.slot = slot;
  }

  pub fn successors(&self) -> &[InterfaceRef] {
    &self.successors
  }

  pub fn predecessors(&self) -> &[InterfaceRef] {
    &self.predecessors
  }

  pub fn content(&self) -> MutexGuard<'_, Content> {
    self.content.lock().unwrap()
  }

  pub fn content_cell(&self) -> ContentCell {
    self.content.clone()
  }

  /// Current scalar value, `None` when unset or not a scalar interface.
  pub fn value(&self) -> Option<Value> {
    match &*self.content() {
      Content::Scalar(value) => value.clone(),
      _ => None,
    }
  }

  pub fn set_value(&self, value: Option<Value>) -> Result<(), FlowError> {
    match &mut *self.content() {
      Content::Scalar(current) => {
        *current = value;
        Ok(())
      }
      _ => Err(self.mismatch(InterfaceVariant::Scalar)),
    }
  }

  pub fn items(&self) -> Option<Vec<String>> {
    match &*self.content() {
      Content::List(items) => Some(items.clone()),
      _ => None,
    }
  }

  pub fn set_items(&self, items: Vec<String>) -> Result<(), FlowError> {
    match &mut *self.content() {
      Content::List(current) => {
        *current = items;
        Ok(())
      }
      _ => Err(self.mismatch(InterfaceVariant::List)),
    }
  }

  /// Check whether `other` may connect to this interface as its predecessor.
  pub fn is_compatible(&self, other: &Interface) -> bool {
    if self.at == other.at || self.at.node == other.at.node {
      return false;
    }
    if !self.kind.is_input() || other.kind.is_input() {
      return false;
    }
    self.variant.accepts(other.variant)
  }

  /// Merge the content of a connected interface into this one.
  pub fn load(&self, other: &Interface) -> Result<(), FlowError> {
    if !self.predecessors.contains(&other.at) && !self.successors.contains(&other.at) {
      return Err(FlowError::NotConnected {
        interface: self.to_string(),
        other: other.to_string(),
      });
    }

    let payload = other.content().snapshot()?;
    let mut content = self.content();
    match (&mut *content, payload) {
      (Content::Scalar(value), Payload::Scalar(upstream)) => *value = upstream,
      (Content::List(items), Payload::List(upstream)) => *items = upstream,
      (Content::Stream(stream), Payload::Bytes(bytes)) => stream.append(&bytes)?,
      (Content::Stream(stream), Payload::Scalar(upstream)) => {
        let line = format!("{}\n", render_scalar(upstream.as_ref()));
        stream.append(line.as_bytes())?;
      }
      (Content::Stream(stream), Payload::List(upstream)) => {
        stream.append(upstream.join("\n").as_bytes())?;
      }
      _ => {
        return Err(FlowError::Incompatible {
          upstream: other.to_string(),
          downstream: self.to_string(),
        });
      }
    }

    debug!(interface = %self, from = %other, "loaded upstream content");
    Ok(())
  }

  pub fn clean(&self) {
    self.content().clean();
  }

  /// Type label and name, e.g. `ScalarInterface(out)`.
  pub fn fullname(&self) -> String {
    format!("{}({})", self.variant.type_label(), self.name)
  }

  pub(crate) fn set_owner(&mut self, owner: &str) {
    self.owner = owner.to_string();
  }

  pub(crate) fn push_successor(&mut self, to: InterfaceRef) {
    self.successors.push(to);
  }

  pub(crate) fn push_predecessor(&mut self, from: InterfaceRef) {
    self.predecessors.push(from);
  }

  pub(crate) fn drop_successor(&mut self, to: InterfaceRef) -> bool {
    let before = self.successors.len();
    self.successors.retain(|s| *s != to);
    before != self.successors.len()
  }

  pub(crate) fn drop_predecessor(&mut self, from: InterfaceRef) -> bool {
    let before = self.predecessors.len();
    self.predecessors.retain(|p| *p != from);
    before != self.predecessors.len()
  }

  fn mismatch(&self, expected: InterfaceVariant) -> FlowError {
    FlowError::VariantMismatch {
      interface: self.to_string(),
      expected: expected.to_string(),
    }
  }
}

impl fmt::Display for Interface {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}::{}", self.owner, self.fullname())
  }
}
