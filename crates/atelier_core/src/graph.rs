//! Flat (executable) node graphs and the graph shape union.

use crate::{VisualGraph, VisualLink};
use atelier_error::{GraphError, GraphErrorKind};
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// A reference from one node's input to another node's output slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
#[display("{}:{}", node, slot)]
pub struct NodeLink {
    /// Id of the node producing the value
    pub node: String,
    /// Output slot index on the producing node
    pub slot: u32,
}

impl NodeLink {
    /// Create a link to `slot` of `node`.
    pub fn new(node: impl Into<String>, slot: u32) -> Self {
        Self {
            node: node.into(),
            slot,
        }
    }
}

/// The value bound to a node input: an authored literal or a link to another node.
///
/// On the wire a link is the two-element array `["<node id>", <slot>]`; everything else
/// is a literal.
///
/// # Examples
///
/// ```
/// use atelier_core::{InputValue, NodeLink};
/// use serde_json::json;
///
/// let link = InputValue::from_value(json!(["4", 1]));
/// assert_eq!(link, InputValue::Link(NodeLink::new("4", 1)));
///
/// let literal = InputValue::from_value(json!("a lighthouse at dusk"));
/// assert_eq!(literal.as_str(), Some("a lighthouse at dusk"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    /// Authored literal (string, number, bool, or other JSON)
    Literal(Value),
    /// Reference to another node's output
    Link(NodeLink),
}

impl InputValue {
    /// Interpret a raw JSON input value.
    pub fn from_value(value: Value) -> Self {
        if let Some([Value::String(node), Value::Number(slot)]) =
            value.as_array().map(Vec::as_slice)
        {
            if let Some(slot) = slot.as_u64().and_then(|s| u32::try_from(s).ok()) {
                return InputValue::Link(NodeLink::new(node.clone(), slot));
            }
        }
        InputValue::Literal(value)
    }

    /// Convert back to the wire representation.
    pub fn to_value(&self) -> Value {
        match self {
            InputValue::Literal(value) => value.clone(),
            InputValue::Link(link) => Value::Array(vec![
                Value::String(link.node.clone()),
                Value::from(link.slot),
            ]),
        }
    }

    /// Literal string content, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            InputValue::Literal(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Literal numeric content, if any.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            InputValue::Literal(value) => value.as_u64(),
            InputValue::Link(_) => None,
        }
    }

    /// Whether this input is fed by another node.
    pub fn is_link(&self) -> bool {
        matches!(self, InputValue::Link(_))
    }

    /// Whether this input holds a literal number.
    pub fn is_number(&self) -> bool {
        matches!(self, InputValue::Literal(Value::Number(_)))
    }

    /// The link, if this input is fed by another node.
    pub fn as_link(&self) -> Option<&NodeLink> {
        match self {
            InputValue::Link(link) => Some(link),
            InputValue::Literal(_) => None,
        }
    }
}

impl From<Value> for InputValue {
    fn from(value: Value) -> Self {
        InputValue::from_value(value)
    }
}

impl From<NodeLink> for InputValue {
    fn from(link: NodeLink) -> Self {
        InputValue::Link(link)
    }
}

impl Serialize for InputValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InputValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(InputValue::from_value)
    }
}

/// One executable node of a flat graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node id, unique within its graph (the map key on the wire)
    #[serde(skip)]
    pub id: String,
    /// Named inputs
    #[serde(default)]
    pub inputs: BTreeMap<String, InputValue>,
    /// Operation type executed by the backend (e.g. `KSampler`)
    pub class_type: String,
    /// Pass-through editor metadata such as the node title
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl GraphNode {
    /// Create a node with no inputs.
    pub fn new(id: impl Into<String>, class_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class_type: class_type.into(),
            ..Default::default()
        }
    }

    /// Builder-style input setter.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<InputValue>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    /// Builder-style title setter.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.meta = Some(serde_json::json!({ "title": title.into() }));
        self
    }

    /// Look up an input by name.
    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.get(name)
    }

    /// Literal string value of an input, if present.
    pub fn literal_str(&self, name: &str) -> Option<&str> {
        self.inputs.get(name).and_then(InputValue::as_str)
    }

    /// Overwrite (or insert) an input with a literal.
    pub fn set_literal(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.inputs
            .insert(name.into(), InputValue::Literal(value.into()));
    }

    /// Editor title, when the graph carries one.
    pub fn title(&self) -> Option<&str> {
        self.meta
            .as_ref()
            .and_then(|meta| meta.get("title"))
            .and_then(Value::as_str)
    }
}

/// A flat, executable graph: node id → node, in declaration order.
///
/// Declaration order is preserved through parsing and serialization because the
/// fallback heuristics depend on it.
///
/// # Examples
///
/// ```
/// use atelier_core::FlatGraph;
///
/// let graph = FlatGraph::from_json(r#"{
///     "3": {"class_type": "KSampler", "inputs": {"seed": 5, "model": ["4", 0]}},
///     "4": {"class_type": "CheckpointLoaderSimple", "inputs": {"ckpt_name": "sd.safetensors"}}
/// }"#).unwrap();
///
/// assert_eq!(graph.len(), 2);
/// assert_eq!(graph.node_ids().collect::<Vec<_>>(), vec!["3", "4"]);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatGraph {
    nodes: Vec<GraphNode>,
}

impl FlatGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from nodes, rejecting duplicate ids.
    pub fn from_nodes(nodes: Vec<GraphNode>) -> Result<Self, GraphError> {
        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(GraphError::new(GraphErrorKind::MalformedNode(format!(
                    "duplicate node id {}",
                    node.id
                ))));
            }
        }
        Ok(Self { nodes })
    }

    /// Parse the flat wire form.
    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        serde_json::from_str(text)
            .map_err(|e| GraphError::new(GraphErrorKind::MalformedNode(e.to_string())))
    }

    /// Parse the flat wire form from an already-decoded document.
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        serde_json::from_value(value)
            .map_err(|e| GraphError::new(GraphErrorKind::MalformedNode(e.to_string())))
    }

    /// Serialize to the flat wire form.
    pub fn to_value(&self) -> Value {
        let map = self
            .nodes
            .iter()
            .map(|node| {
                let body = serde_json::to_value(node).unwrap_or(Value::Null);
                (node.id.clone(), body)
            })
            .collect::<serde_json::Map<_, _>>();
        Value::Object(map)
    }

    /// Look up a node.
    pub fn get(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Look up a node for modification.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// Whether a node with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Nodes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    /// Nodes in declaration order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.iter_mut()
    }

    /// Node ids in declaration order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    /// Operation type of a node.
    pub fn class_type(&self, id: &str) -> Option<&str> {
        self.get(id).map(|node| node.class_type.as_str())
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Serialize for FlatGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.nodes.len()))?;
        for node in &self.nodes {
            map.serialize_entry(&node.id, node)?;
        }
        map.end()
    }
}

struct FlatGraphVisitor;

impl<'de> Visitor<'de> for FlatGraphVisitor {
    type Value = FlatGraph;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of node id to node")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<FlatGraph, A::Error> {
        let mut nodes: Vec<GraphNode> = Vec::new();
        while let Some((id, mut node)) = access.next_entry::<String, GraphNode>()? {
            if nodes.iter().any(|existing| existing.id == id) {
                return Err(de::Error::custom(format!("duplicate node id {}", id)));
            }
            node.id = id;
            nodes.push(node);
        }
        Ok(FlatGraph { nodes })
    }
}

impl<'de> Deserialize<'de> for FlatGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(FlatGraphVisitor)
    }
}

/// Either accepted graph shape.
///
/// Shape detection happens once, here, at the parsing boundary; downstream code only
/// ever sees a [`FlatGraph`] after normalization.
///
/// # Examples
///
/// ```
/// use atelier_core::WorkflowGraph;
///
/// let visual = WorkflowGraph::from_json(r#"{"nodes": [], "links": []}"#).unwrap();
/// assert!(!visual.is_flat());
///
/// let flat = WorkflowGraph::from_json(r#"{"prompt": {"9": {"class_type": "SaveImage", "inputs": {}}}}"#).unwrap();
/// assert!(flat.is_flat());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowGraph {
    /// Editor form with decoration nodes and a link table
    Visual(VisualGraph),
    /// Executable id → node map
    Flat(FlatGraph),
}

fn is_node(value: &Value) -> bool {
    value.get("class_type").and_then(Value::as_str).is_some()
}

fn is_node_map(value: &Value) -> bool {
    match value {
        Value::Object(map) => !is_node(value) && map.values().all(is_node),
        _ => false,
    }
}

fn parse_links(links: Option<Value>) -> Result<Vec<VisualLink>, GraphError> {
    match links {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(rows)) => rows
            .iter()
            .enumerate()
            .map(|(index, row)| {
                VisualLink::from_value(row).map_err(|reason| {
                    GraphError::new(GraphErrorKind::MalformedLink(format!(
                        "link row {}: {}",
                        index, reason
                    )))
                })
            })
            .collect(),
        Some(other) => Err(GraphError::new(GraphErrorKind::MalformedLink(format!(
            "link table must be an array, got {}",
            other
        )))),
    }
}

impl WorkflowGraph {
    /// Parse either shape from JSON text.
    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| GraphError::new(GraphErrorKind::UnrecognizedShape(e.to_string())))?;
        Self::from_value(value)
    }

    /// Detect the shape of a decoded document and parse it.
    pub fn from_value(value: Value) -> Result<Self, GraphError> {
        let Value::Object(mut map) = value else {
            return Err(GraphError::new(GraphErrorKind::UnrecognizedShape(
                "expected a JSON object".into(),
            )));
        };

        if matches!(map.get("nodes"), Some(Value::Array(_))) {
            let links = parse_links(map.remove("links"))?;
            let mut visual: VisualGraph = serde_json::from_value(Value::Object(map))
                .map_err(|e| GraphError::new(GraphErrorKind::MalformedNode(e.to_string())))?;
            visual.links = links;
            return Ok(WorkflowGraph::Visual(visual));
        }

        // A node may itself be keyed "prompt"; only a map of nodes is an envelope.
        if map.get("prompt").is_some_and(is_node_map) {
            if let Some(prompt) = map.remove("prompt") {
                return FlatGraph::from_value(prompt).map(WorkflowGraph::Flat);
            }
        }

        if map.values().all(is_node) {
            return FlatGraph::from_value(Value::Object(map)).map(WorkflowGraph::Flat);
        }

        Err(GraphError::new(GraphErrorKind::UnrecognizedShape(
            "object is neither a visual graph nor a flat graph".into(),
        )))
    }

    /// Whether this graph is already executable.
    pub fn is_flat(&self) -> bool {
        matches!(self, WorkflowGraph::Flat(_))
    }
}

impl From<FlatGraph> for WorkflowGraph {
    fn from(graph: FlatGraph) -> Self {
        WorkflowGraph::Flat(graph)
    }
}

impl From<VisualGraph> for WorkflowGraph {
    fn from(graph: VisualGraph) -> Self {
        WorkflowGraph::Visual(graph)
    }
}

impl Serialize for WorkflowGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WorkflowGraph::Visual(graph) => graph.serialize(serializer),
            WorkflowGraph::Flat(graph) => graph.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for WorkflowGraph {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        WorkflowGraph::from_value(value).map_err(de::Error::custom)
    }
}
