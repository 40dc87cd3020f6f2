//! XML rendition of a flow.
//!
//! ```xml
//! <flow>
//!   <node id="Value" type="conflux.nodes.ValueInput">
//!     <graphproperty name="x" value="120"/>
//!     <interface name="value" slot="false" value="hello"/>
//!     <interface name="out">
//!       <successor node="Lines" interface="text"/>
//!     </interface>
//!   </node>
//! </flow>
//! ```
//!
//! `slot` and `value` are written only for scalar inputs, `value` only when
//! the interface holds a literal. Strings are written as is unless they would
//! read back as another JSON value, in which case they are quoted. Every
//! other literal is written as JSON text.

use std::collections::HashMap;

use conflux_graph::{Flow, Node, TaskRegistry};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::FormatError;

/// Render `flow` as an XML document, nodes in canonical order.
pub fn export(flow: &Flow) -> Result<String, FormatError> {
  let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
  writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
  writer.write_event(Event::Start(BytesStart::new("flow")))?;

  for node in flow.canonical_order()? {
    let mut element = BytesStart::new("node");
    element.push_attribute(("id", node.id()));
    element.push_attribute(("type", node.type_name()));
    writer.write_event(Event::Start(element))?;

    for (name, value) in node.graphical_properties() {
      let mut property = BytesStart::new("graphproperty");
      property.push_attribute(("name", name.as_str()));
      property.push_attribute(("value", value.as_str()));
      writer.write_event(Event::Empty(property))?;
    }

    for interface in node.interfaces() {
      let mut element = BytesStart::new("interface");
      element.push_attribute(("name", interface.name()));
      if interface.is_input() && interface.is_value() {
        element.push_attribute(("slot", if interface.slot() { "true" } else { "false" }));
        if !interface.slot() {
          if let Some(value) = interface.value() {
            let literal = encode_literal(&value);
            element.push_attribute(("value", literal.as_str()));
          }
        }
      }

      if interface.successors().is_empty() {
        writer.write_event(Event::Empty(element))?;
        continue;
      }

      writer.write_event(Event::Start(element))?;
      for successor in interface.successors() {
        let Some(target) = flow.interface(*successor) else {
          continue;
        };
        let Some(target_node) = flow.node(successor.node) else {
          continue;
        };
        let mut edge = BytesStart::new("successor");
        edge.push_attribute(("node", target_node.id()));
        edge.push_attribute(("interface", target.name()));
        writer.write_event(Event::Empty(edge))?;
      }
      writer.write_event(Event::End(BytesEnd::new("interface")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("node")))?;
  }

  writer.write_event(Event::End(BytesEnd::new("flow")))?;
  let mut document = String::from_utf8(writer.into_inner()).map_err(FormatError::parsing)?;
  document.push('\n');
  Ok(document)
}

/// Parsed `<node>` element.
#[derive(Debug, Default)]
struct NodeElement {
  id: String,
  type_name: String,
  properties: Vec<(String, String)>,
  interfaces: Vec<InterfaceElement>,
}

/// Parsed `<interface>` element.
#[derive(Debug, Default)]
struct InterfaceElement {
  name: String,
  slot: Option<bool>,
  value: Option<String>,
  successors: Vec<(String, String)>,
}

/// Build a flow from an XML document, resolving node types through
/// `registry`.
///
/// Nodes are created first; literals, slot flags and connectors are applied
/// once every node exists. The result is sorted by incidence and not marked
/// modified.
pub fn import(document: &str, registry: &dyn TaskRegistry) -> Result<Flow, FormatError> {
  let elements = parse(document)?;
  let mut flow = Flow::new();

  for element in &elements {
    debug!(node_id = %element.id, type_name = %element.type_name, "importing node");
    let mut node: Node = registry
      .create(&element.type_name)
      .ok_or_else(|| FormatError::UnknownNodeType {
        type_name: element.type_name.clone(),
      })?
      .with_id(element.id.clone());
    node
      .graphical_properties_mut()
      .extend(element.properties.iter().cloned());
    flow.add_node(node)?;
  }

  for element in &elements {
    for entry in &element.interfaces {
      let node = flow.find_node_mut(&element.id)?;
      let interface = node.find_interface_mut(&entry.name)?;
      if interface.is_input() && interface.is_value() {
        let slot = entry.slot.unwrap_or(true);
        interface.set_slot(slot);
        if !slot {
          interface.set_value(entry.value.as_deref().map(decode_literal))?;
        }
      } else {
        interface.set_slot(true);
      }

      let from = interface.at();
      for (target_node, target_interface) in &entry.successors {
        let to = flow.find_interface(target_node, target_interface)?;
        flow.add_connector(from, to)?;
      }
    }
  }

  flow.sort_nodes_by_incidence()?;
  flow.set_modified(false);
  Ok(flow)
}

fn parse(document: &str) -> Result<Vec<NodeElement>, FormatError> {
  let mut reader = Reader::from_str(document);
  reader.config_mut().trim_text(true);

  let mut buf = Vec::new();
  let mut in_flow = false;
  let mut nodes: Vec<NodeElement> = Vec::new();
  let mut node: Option<NodeElement> = None;
  let mut interface: Option<InterfaceElement> = None;

  loop {
    let event = reader.read_event_into(&mut buf)?;
    let (element, empty) = match &event {
      Event::Start(e) => (Some(e), false),
      Event::Empty(e) => (Some(e), true),
      _ => (None, false),
    };

    if let Some(element) = element {
      let attributes = attributes(element)?;
      match element.name().as_ref() {
        b"flow" => in_flow = true,
        b"node" if in_flow && node.is_none() => {
          let parsed = NodeElement {
            id: required(&attributes, "node", "id")?,
            type_name: required(&attributes, "node", "type")?,
            ..NodeElement::default()
          };
          if empty {
            nodes.push(parsed);
          } else {
            node = Some(parsed);
          }
        }
        b"graphproperty" => {
          let current = node.as_mut().ok_or_else(|| misplaced("graphproperty"))?;
          current.properties.push((
            required(&attributes, "graphproperty", "name")?,
            attributes.get("value").cloned().unwrap_or_default(),
          ));
        }
        b"interface" if interface.is_none() => {
          let current = node.as_mut().ok_or_else(|| misplaced("interface"))?;
          let slot = match attributes.get("slot") {
            Some(flag) => Some(parse_flag(flag)?),
            None => None,
          };
          let parsed = InterfaceElement {
            name: required(&attributes, "interface", "name")?,
            slot,
            value: attributes.get("value").cloned(),
            successors: Vec::new(),
          };
          if empty {
            current.interfaces.push(parsed);
          } else {
            interface = Some(parsed);
          }
        }
        b"successor" => {
          let current = interface.as_mut().ok_or_else(|| misplaced("successor"))?;
          current.successors.push((
            required(&attributes, "successor", "node")?,
            required(&attributes, "successor", "interface")?,
          ));
        }
        other => {
          return Err(FormatError::parsing(format!(
            "unexpected element <{}>",
            String::from_utf8_lossy(other)
          )));
        }
      }
      buf.clear();
      continue;
    }

    match event {
      Event::End(e) => match e.name().as_ref() {
        b"interface" => {
          let finished = interface.take().ok_or_else(|| misplaced("/interface"))?;
          node
            .as_mut()
            .ok_or_else(|| misplaced("/interface"))?
            .interfaces
            .push(finished);
        }
        b"node" => nodes.push(node.take().ok_or_else(|| misplaced("/node"))?),
        b"flow" => in_flow = false,
        _ => {}
      },
      Event::Eof => break,
      Event::Text(_) => warn!("ignoring text content in flow document"),
      _ => {}
    }
    buf.clear();
  }

  if node.is_some() || interface.is_some() {
    return Err(FormatError::parsing("document ended inside an element"));
  }
  Ok(nodes)
}

fn encode_literal(value: &Value) -> String {
  match value {
    Value::String(s) if serde_json::from_str::<Value>(s).is_err() => s.clone(),
    other => other.to_string(),
  }
}

fn decode_literal(text: &str) -> Value {
  serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn attributes(element: &BytesStart) -> Result<HashMap<String, String>, FormatError> {
  let mut map = HashMap::new();
  for attribute in element.attributes() {
    let attribute = attribute.map_err(FormatError::parsing)?;
    let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
    let value = attribute
      .unescape_value()
      .map_err(FormatError::parsing)?
      .into_owned();
    map.insert(key, value);
  }
  Ok(map)
}

fn required(
  attributes: &HashMap<String, String>,
  element: &str,
  name: &str,
) -> Result<String, FormatError> {
  attributes.get(name).cloned().ok_or_else(|| {
    FormatError::parsing(format!("<{}> is missing its '{}' attribute", element, name))
  })
}

fn misplaced(element: &str) -> FormatError {
  FormatError::parsing(format!("misplaced <{}>", element))
}

fn parse_flag(flag: &str) -> Result<bool, FormatError> {
  match flag.to_ascii_lowercase().as_str() {
    "true" => Ok(true),
    "false" => Ok(false),
    other => Err(FormatError::parsing(format!("invalid slot flag '{}'", other))),
  }
}
