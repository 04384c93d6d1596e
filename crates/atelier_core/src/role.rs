//! Parameter roles and the per-template role → node mapping.

use atelier_error::{GraphError, GraphErrorKind};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// Abstract generation parameters that can be bound into a graph.
///
/// # Examples
///
/// ```
/// use atelier_core::Role;
///
/// assert_eq!(Role::from_key("prompt"), Some(Role::PromptInput));
/// assert_eq!(Role::from_key("save_image_node_id"), Some(Role::SaveOutput));
/// assert_eq!(Role::PromptInput.to_string(), "prompt_input");
/// assert!(Role::FirstFrameImage.is_reference_image());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    /// Positive prompt text
    PromptInput,
    /// Image persist node (output filename prefix)
    SaveOutput,
    /// Video persist node (output filename prefix)
    VideoSaveOutput,
    /// Output width
    Width,
    /// Output height
    Height,
    /// Character reference image loader
    CharacterReferenceImage,
    /// Scene reference image loader
    SceneReferenceImage,
    /// First frame of a video or transition
    FirstFrameImage,
    /// Last frame of a transition
    LastFrameImage,
    /// Number of video frames
    FrameCount,
    /// Longest-side constraint for resize nodes
    MaxSide,
}

impl Role {
    /// Resolve a mapping key, accepting the common spellings found in stored mappings.
    ///
    /// Keys are compared case-insensitively and a trailing `_node_id`/`_node`/`_id`
    /// suffix is ignored.
    pub fn from_key(key: &str) -> Option<Role> {
        let lower = key.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let stem = ["_node_id", "_node", "_id"]
            .iter()
            .find_map(|suffix| lower.strip_suffix(suffix))
            .unwrap_or(&lower);

        let role = match stem {
            "prompt_input" | "prompt" | "positive_prompt" | "positive" | "text" => {
                Role::PromptInput
            }
            "save_output" | "save_image" | "output" | "save" | "image_output" => Role::SaveOutput,
            "video_save_output" | "save_video" | "video_output" | "video_save" => {
                Role::VideoSaveOutput
            }
            "width" => Role::Width,
            "height" => Role::Height,
            "character_reference_image" | "character_reference" | "character_image"
            | "character_ref" | "char_image" => Role::CharacterReferenceImage,
            "scene_reference_image" | "scene_reference" | "scene_image" | "scene_ref" => {
                Role::SceneReferenceImage
            }
            "first_frame_image" | "first_frame" | "start_image" | "start_frame" => {
                Role::FirstFrameImage
            }
            "last_frame_image" | "last_frame" | "end_image" | "end_frame" => {
                Role::LastFrameImage
            }
            "frame_count" | "frames" | "num_frames" | "length" | "video_length" => {
                Role::FrameCount
            }
            "max_side" | "max_size" | "longest_side" => Role::MaxSide,
            _ => return None,
        };
        Some(role)
    }

    /// Whether this role names a reference-image loader.
    pub fn is_reference_image(&self) -> bool {
        matches!(
            self,
            Role::CharacterReferenceImage
                | Role::SceneReferenceImage
                | Role::FirstFrameImage
                | Role::LastFrameImage
        )
    }
}

/// Where a role is bound: a node id and, optionally, the exact input field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoleTarget {
    /// Target node id
    pub node_id: String,
    /// Input field override; the binder's per-role default is used when absent
    pub field: Option<String>,
}

impl RoleTarget {
    /// Target a node, leaving the field to the binder.
    pub fn node(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            field: None,
        }
    }

    /// Target an exact input field of a node.
    pub fn field(node_id: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            field: Some(field.into()),
        }
    }

    fn from_value(value: &Value) -> Result<Option<Self>, String> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) if s.trim().is_empty() => Ok(None),
            Value::String(s) => Ok(Some(Self::node(s.trim()))),
            Value::Number(n) => Ok(Some(Self::node(n.to_string()))),
            Value::Object(map) => {
                let node_id = ["node", "node_id", "id"]
                    .iter()
                    .find_map(|key| match map.get(*key) {
                        Some(Value::String(s)) if !s.trim().is_empty() => {
                            Some(s.trim().to_string())
                        }
                        Some(Value::Number(n)) => Some(n.to_string()),
                        _ => None,
                    });
                let field = ["field", "input"]
                    .iter()
                    .find_map(|key| map.get(*key).and_then(Value::as_str))
                    .map(str::to_string);
                Ok(node_id.map(|node_id| Self { node_id, field }))
            }
            other => Err(format!("unsupported role target {}", other)),
        }
    }

    fn to_value(&self) -> Value {
        match &self.field {
            None => Value::String(self.node_id.clone()),
            Some(field) => serde_json::json!({ "node": self.node_id, "field": field }),
        }
    }
}

/// Per-template mapping from role to node.
///
/// Absent roles fall back to heuristics during binding.
///
/// # Examples
///
/// ```
/// use atelier_core::{Role, RoleMapping};
///
/// let mapping = RoleMapping::from_json(r#"{
///     "prompt": "6",
///     "save_image": "9",
///     "frame_count": {"node": "55", "field": "length"},
///     "last_frame": ""
/// }"#).unwrap();
///
/// assert_eq!(mapping.node_id(Role::PromptInput), Some("6"));
/// assert_eq!(mapping.get(Role::FrameCount).and_then(|t| t.field.as_deref()), Some("length"));
/// assert_eq!(mapping.node_id(Role::LastFrameImage), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleMapping {
    targets: BTreeMap<Role, RoleTarget>,
}

impl RoleMapping {
    /// Empty mapping: every role uses heuristics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert of a node-only target.
    pub fn with(mut self, role: Role, node_id: impl Into<String>) -> Self {
        self.targets.insert(role, RoleTarget::node(node_id));
        self
    }

    /// Builder-style insert of an explicit target.
    pub fn with_target(mut self, role: Role, target: RoleTarget) -> Self {
        self.targets.insert(role, target);
        self
    }

    /// Parse a stored mapping document. Blank text yields an empty mapping.
    pub fn from_json(text: &str) -> Result<Self, GraphError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: Value = serde_json::from_str(text)
            .map_err(|e| GraphError::new(GraphErrorKind::InvalidRoleMapping(e.to_string())))?;
        Self::from_value(&value)
    }

    /// Interpret a decoded mapping document.
    ///
    /// Unknown role names are logged and skipped; blank or null targets are treated as
    /// unmapped.
    pub fn from_value(value: &Value) -> Result<Self, GraphError> {
        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(GraphError::new(GraphErrorKind::InvalidRoleMapping(format!(
                    "expected an object, got {}",
                    other
                ))));
            }
        };

        let mut targets = BTreeMap::new();
        for (key, raw) in map {
            let Some(role) = Role::from_key(key) else {
                warn!(key = %key, "Ignoring unknown role in mapping");
                continue;
            };
            let target = RoleTarget::from_value(raw)
                .map_err(|e| GraphError::new(GraphErrorKind::InvalidRoleMapping(e)))?;
            if let Some(target) = target {
                targets.insert(role, target);
            }
        }
        Ok(Self { targets })
    }

    /// Target for a role, if mapped.
    pub fn get(&self, role: Role) -> Option<&RoleTarget> {
        self.targets.get(&role)
    }

    /// Node id for a role, if mapped.
    pub fn node_id(&self, role: Role) -> Option<&str> {
        self.targets.get(&role).map(|target| target.node_id.as_str())
    }

    /// All mapped roles in role order.
    pub fn iter(&self) -> impl Iterator<Item = (Role, &RoleTarget)> {
        self.targets.iter().map(|(role, target)| (*role, target))
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl Serialize for RoleMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.targets.len()))?;
        for (role, target) in &self.targets {
            map.serialize_entry(role.as_ref(), &target.to_value())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RoleMapping {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        RoleMapping::from_value(&value).map_err(serde::de::Error::custom)
    }
}
