//! The editor ("visual") graph shape.
//!
//! Visual graphs are what node editors save: a node list including non-executable
//! decorations, widget values stored positionally, and a separate link table. They are
//! never submitted as-is.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Editor graph document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualGraph {
    /// All nodes, including decorations
    pub nodes: Vec<VisualNode>,
    /// Link table
    #[serde(default)]
    pub links: Vec<VisualLink>,
    /// Groups, editor config, version stamps and anything else carried along
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// One editor node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualNode {
    /// Node id (numeric in most editors, kept as text)
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Declared node type
    #[serde(rename = "type")]
    pub node_type: String,
    /// Declared input slots
    #[serde(default)]
    pub inputs: Vec<VisualInput>,
    /// Authored widget values, positional (array) or by name (object)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widgets_values: Option<Value>,
    /// Editor title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Editor execution mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<i64>,
}

impl VisualNode {
    /// Create a node with the given id and type.
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            ..Default::default()
        }
    }
}

/// A declared input slot on an editor node.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VisualInput {
    /// Slot name
    pub name: String,
    /// Slot data type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub input_type: Option<String>,
    /// Id of the link feeding this slot
    #[serde(default)]
    pub link: Option<i64>,
    /// Present when the slot is backed by a widget value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget: Option<WidgetRef>,
}

/// Marks a slot as widget-backed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WidgetRef {
    /// Widget name
    pub name: String,
}

/// One row of the link table.
///
/// Editors write links either as `[id, origin, origin_slot, target, target_slot, type]`
/// arrays or as objects with the same fields; both are accepted, arrays are written.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VisualLink {
    /// Link id
    pub id: i64,
    /// Producing node id
    pub origin_id: String,
    /// Producing output slot
    pub origin_slot: u32,
    /// Consuming node id
    pub target_id: String,
    /// Consuming input slot index
    pub target_slot: u32,
    /// Data type carried
    pub link_type: Option<String>,
}

impl VisualLink {
    pub(crate) fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Array(items) if items.len() >= 5 => Ok(Self {
                id: items[0].as_i64().ok_or("link id must be an integer")?,
                origin_id: id_text(&items[1]).ok_or("link origin must be an id")?,
                origin_slot: slot(&items[2]).ok_or("link origin slot must be an index")?,
                target_id: id_text(&items[3]).ok_or("link target must be an id")?,
                target_slot: slot(&items[4]).ok_or("link target slot must be an index")?,
                link_type: items.get(5).and_then(Value::as_str).map(str::to_string),
            }),
            Value::Object(map) => {
                let field = |name: &str| map.get(name).unwrap_or(&NULL);
                Ok(Self {
                    id: field("id").as_i64().ok_or("link id must be an integer")?,
                    origin_id: id_text(field("origin_id")).ok_or("link origin must be an id")?,
                    origin_slot: slot(field("origin_slot"))
                        .ok_or("link origin slot must be an index")?,
                    target_id: id_text(field("target_id")).ok_or("link target must be an id")?,
                    target_slot: slot(field("target_slot"))
                        .ok_or("link target slot must be an index")?,
                    link_type: field("type").as_str().map(str::to_string),
                })
            }
            other => Err(format!("unsupported link entry {}", other)),
        }
    }
}

impl Serialize for VisualLink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(6)?;
        tuple.serialize_element(&self.id)?;
        tuple.serialize_element(&self.origin_id)?;
        tuple.serialize_element(&self.origin_slot)?;
        tuple.serialize_element(&self.target_id)?;
        tuple.serialize_element(&self.target_slot)?;
        tuple.serialize_element(&self.link_type)?;
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for VisualLink {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        VisualLink::from_value(&value).map_err(de::Error::custom)
    }
}

static NULL: Value = Value::Null;

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn slot(value: &Value) -> Option<u32> {
    value.as_u64().and_then(|s| u32::try_from(s).ok())
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = Value::deserialize(deserializer)?;
    id_text(&value).ok_or_else(|| de::Error::custom("node id must be a string or number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn link_accepts_array_and_object_forms() {
        let from_array: VisualLink =
            serde_json::from_value(json!([7, 4, 0, 3, 1, "MODEL"])).unwrap();
        let from_object: VisualLink = serde_json::from_value(json!({
            "id": 7, "origin_id": 4, "origin_slot": 0,
            "target_id": 3, "target_slot": 1, "type": "MODEL"
        }))
        .unwrap();

        assert_eq!(from_array, from_object);
        assert_eq!(from_array.origin_id, "4");
        assert_eq!(from_array.target_slot, 1);
    }

    #[test]
    fn link_rejects_short_rows() {
        let parsed: Result<VisualLink, _> = serde_json::from_value(json!([7, 4]));
        assert!(parsed.is_err());
    }

    #[test]
    fn node_ids_become_text() {
        let node: VisualNode =
            serde_json::from_value(json!({"id": 12, "type": "LoadImage"})).unwrap();
        assert_eq!(node.id, "12");
        assert!(node.inputs.is_empty());
    }
}
