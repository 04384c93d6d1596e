//! Wire types for the backend HTTP API.

use atelier_core::{ArtifactKind, ArtifactRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Marker in filenames of scratch previews that are not real results.
pub const TEMP_MARKER: &str = "_temp_";

/// Output keys that always hold video files.
pub const VIDEO_OUTPUT_KEYS: &[&str] = &["videos", "gifs"];

/// File extensions treated as video.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "mkv", "avi", "m4v", "gif"];

/// Body of `POST /prompt`.
#[derive(Debug, Clone, Serialize)]
pub struct PromptSubmission<'a> {
    /// Flat graph in wire form
    pub prompt: &'a Value,
    /// Client identifier used by the backend for event routing
    pub client_id: &'a str,
}

/// Successful `POST /prompt` response.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptAccepted {
    /// Backend-assigned job id
    pub prompt_id: String,
    /// Queue position
    #[serde(default)]
    pub number: Option<i64>,
    /// Per-node validation errors
    #[serde(default)]
    pub node_errors: Value,
}

/// `POST /upload/image` response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadedImage {
    /// Stored filename (may differ from the uploaded one)
    pub name: String,
    /// Subfolder within the storage area
    #[serde(default)]
    pub subfolder: String,
    /// Storage area, normally `input`
    #[serde(rename = "type", default)]
    pub storage_type: String,
}

impl UploadedImage {
    /// Handle a loader node accepts: `subfolder/name`, or just `name`.
    pub fn handle(&self) -> String {
        if self.subfolder.is_empty() {
            self.name.clone()
        } else {
            format!("{}/{}", self.subfolder, self.name)
        }
    }
}

/// Status block of a history entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryStatus {
    /// `success` or `error`
    #[serde(default)]
    pub status_str: Option<String>,
    /// Whether execution finished
    #[serde(default)]
    pub completed: bool,
    /// Event log as `[name, payload]` pairs
    #[serde(default)]
    pub messages: Vec<Value>,
}

/// One job's record from `GET /history/{id}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryEntry {
    /// Node id → output lists, in backend enumeration order
    #[serde(default)]
    pub outputs: Map<String, Value>,
    /// Execution status, absent while running
    #[serde(default)]
    pub status: Option<HistoryStatus>,
}

/// A single file listed in a history entry's outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Producing node
    pub node_id: String,
    /// Output list key (`images`, `gifs`, `videos`, ...)
    pub key: String,
    /// File name
    pub filename: String,
    /// Subfolder
    pub subfolder: String,
    /// Storage area (`output`, `temp`)
    pub storage_type: String,
}

impl OutputFile {
    /// Whether this file is a video.
    pub fn is_video(&self) -> bool {
        if VIDEO_OUTPUT_KEYS.contains(&self.key.as_str()) {
            return true;
        }
        self.filename
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .is_some_and(|ext| VIDEO_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Whether this file is a scratch preview.
    pub fn is_temp(&self) -> bool {
        self.filename.contains(TEMP_MARKER)
    }

    /// Artifact reference for this file.
    pub fn to_artifact(&self) -> ArtifactRef {
        let kind = if self.is_video() {
            ArtifactKind::Video
        } else {
            ArtifactKind::Image
        };
        ArtifactRef::new(kind, &self.filename, &self.subfolder, &self.storage_type)
    }
}

impl HistoryEntry {
    /// Extract this job's entry from a `GET /history/{id}` body. `None` while the job
    /// has not produced a record yet.
    pub fn from_history(body: &Value, job_id: &str) -> Result<Option<Self>, serde_json::Error> {
        match body.get(job_id) {
            None | Some(Value::Null) => Ok(None),
            Some(entry) => serde_json::from_value(entry.clone()).map(Some),
        }
    }

    /// Backend-reported execution failure, if any.
    pub fn execution_error(&self) -> Option<String> {
        let status = self.status.as_ref()?;

        for message in &status.messages {
            let Some(pair) = message.as_array() else {
                continue;
            };
            let (Some(name), Some(payload)) = (pair.first().and_then(Value::as_str), pair.get(1))
            else {
                continue;
            };
            match name {
                "execution_error" => return Some(describe_execution_error(payload)),
                "execution_interrupted" => {
                    return Some(format!(
                        "Execution interrupted at node {}",
                        payload.get("node_id").map(value_text).unwrap_or_default()
                    ));
                }
                _ => {}
            }
        }

        (status.status_str.as_deref() == Some("error"))
            .then(|| "Backend reported an execution error".to_string())
    }

    /// All output files in enumeration order.
    pub fn output_files(&self) -> Vec<OutputFile> {
        let mut files = Vec::new();
        for (node_id, output) in &self.outputs {
            let Some(lists) = output.as_object() else {
                continue;
            };
            for (key, list) in lists {
                let Some(items) = list.as_array() else {
                    continue;
                };
                for item in items {
                    let Some(filename) = item.get("filename").and_then(Value::as_str) else {
                        continue;
                    };
                    files.push(OutputFile {
                        node_id: node_id.clone(),
                        key: key.clone(),
                        filename: filename.to_string(),
                        subfolder: item
                            .get("subfolder")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                        storage_type: item
                            .get("type")
                            .and_then(Value::as_str)
                            .unwrap_or("output")
                            .to_string(),
                    });
                }
            }
        }
        files
    }
}

fn describe_execution_error(payload: &Value) -> String {
    let message = payload
        .get("exception_message")
        .map(value_text)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "Execution failed".to_string());
    match (payload.get("node_id"), payload.get("node_type")) {
        (Some(id), Some(node_type)) => format!(
            "{} (node {} {})",
            message.trim(),
            value_text(id),
            value_text(node_type)
        ),
        (Some(id), None) => format!("{} (node {})", message.trim(), value_text(id)),
        _ => message.trim().to_string(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// One-line summary of a `node_errors` object, `None` when it is empty.
pub fn summarize_node_errors(node_errors: &Value) -> Option<String> {
    let map = node_errors.as_object().filter(|m| !m.is_empty())?;
    let parts: Vec<String> = map
        .iter()
        .map(|(node_id, detail)| {
            let class_type = detail
                .get("class_type")
                .and_then(Value::as_str)
                .unwrap_or("?");
            let messages: Vec<String> = detail
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .map(|e| {
                            let message = e.get("message").map(value_text).unwrap_or_default();
                            match e.get("details").map(value_text).filter(|d| !d.is_empty()) {
                                Some(details) => format!("{}: {}", message, details),
                                None => message,
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            format!("node {} ({}): {}", node_id, class_type, messages.join("; "))
        })
        .collect();
    Some(parts.join(", "))
}

/// Human-readable reason from a rejected submission body.
///
/// Prefers `error.message` (plus `error.details`), followed by a node error summary;
/// falls back to the raw body.
pub fn rejection_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return body.trim().to_string();
    };

    let error = value.get("error");
    let headline = match error {
        Some(Value::String(s)) => Some(s.clone()),
        Some(obj) => obj.get("message").map(value_text).map(|message| {
            match obj.get("details").map(value_text).filter(|d| !d.is_empty()) {
                Some(details) => format!("{}: {}", message, details),
                None => message,
            }
        }),
        None => None,
    };
    let nodes = value.get("node_errors").and_then(summarize_node_errors);

    match (headline, nodes) {
        (Some(headline), Some(nodes)) => format!("{} [{}]", headline, nodes),
        (Some(headline), None) => headline,
        (None, Some(nodes)) => nodes,
        (None, None) => body.trim().to_string(),
    }
}
