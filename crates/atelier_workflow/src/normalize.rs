//! Editor graph → executable graph conversion.

use crate::heuristics::{SEED_CONTROL_VALUES, SEED_FIELDS, is_decoration, known_widget_names};
use atelier_core::{
    FlatGraph, GraphNode, InputValue, NodeLink, VisualGraph, VisualLink, VisualNode,
    WorkflowGraph,
};
use atelier_error::{GraphError, GraphErrorKind};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, instrument};

/// Produce the executable form of a graph.
///
/// Flat graphs are returned unchanged, so `normalize` is idempotent. Visual graphs lose
/// their decoration nodes and any link touching one; every other node becomes one flat
/// entry whose inputs are either links or authored widget literals.
///
/// # Errors
///
/// Returns [`GraphErrorKind::EmptyGraph`] when no executable node survives a visual
/// conversion. An empty flat graph passes through like any other.
///
/// # Examples
///
/// ```
/// use atelier_core::WorkflowGraph;
/// use atelier_workflow::normalize;
///
/// let visual = WorkflowGraph::from_json(r#"{
///     "nodes": [
///         {"id": 1, "type": "Note", "widgets_values": ["remember to bump steps"]},
///         {"id": 9, "type": "SaveImage", "widgets_values": ["portrait"]}
///     ],
///     "links": []
/// }"#).unwrap();
///
/// let flat = normalize(&visual).unwrap();
/// assert_eq!(flat.len(), 1);
/// assert_eq!(flat.get("9").unwrap().literal_str("filename_prefix"), Some("portrait"));
/// ```
#[instrument(skip_all, fields(flat = graph.is_flat()))]
pub fn normalize(graph: &WorkflowGraph) -> Result<FlatGraph, GraphError> {
    match graph {
        WorkflowGraph::Flat(flat) => Ok(flat.clone()),
        WorkflowGraph::Visual(visual) => normalize_visual(visual),
    }
}

/// Convert an editor graph into its executable form.
pub fn normalize_visual(graph: &VisualGraph) -> Result<FlatGraph, GraphError> {
    let survivors: Vec<&VisualNode> = graph
        .nodes
        .iter()
        .filter(|node| !is_decoration(&node.node_type))
        .collect();
    let surviving_ids: HashSet<&str> = survivors.iter().map(|node| node.id.as_str()).collect();

    let links: HashMap<i64, &VisualLink> = graph
        .links
        .iter()
        .filter(|link| {
            surviving_ids.contains(link.origin_id.as_str())
                && surviving_ids.contains(link.target_id.as_str())
        })
        .map(|link| (link.id, link))
        .collect();
    debug!(
        dropped_nodes = graph.nodes.len() - survivors.len(),
        dropped_links = graph.links.len() - links.len(),
        "Stripped editor-only nodes"
    );

    let nodes = survivors
        .into_iter()
        .map(|node| flatten_node(node, &links))
        .collect::<Result<Vec<_>, _>>()?;

    if nodes.is_empty() {
        return Err(GraphError::new(GraphErrorKind::EmptyGraph));
    }
    FlatGraph::from_nodes(nodes)
}

fn flatten_node(node: &VisualNode, links: &HashMap<i64, &VisualLink>) -> Result<GraphNode, GraphError> {
    if node.node_type.trim().is_empty() {
        return Err(GraphError::new(GraphErrorKind::MalformedNode(format!(
            "node {} has no type",
            node.id
        ))));
    }

    let literals = widget_literals(node);
    let mut inputs = BTreeMap::new();

    for (index, slot) in node.inputs.iter().enumerate() {
        let fed = slot
            .link
            .and_then(|id| links.get(&id))
            .filter(|link| link.target_id == node.id)
            .or_else(|| {
                links
                    .values()
                    .find(|link| link.target_id == node.id && link.target_slot as usize == index)
            });

        if let Some(link) = fed {
            inputs.insert(
                slot.name.clone(),
                InputValue::Link(NodeLink::new(link.origin_id.clone(), link.origin_slot)),
            );
        } else if let Some(value) = literals.get(&slot.name) {
            inputs.insert(slot.name.clone(), InputValue::Literal(value.clone()));
        }
    }

    for (name, value) in literals {
        inputs
            .entry(name)
            .or_insert_with(|| InputValue::Literal(value));
    }

    let mut flat = GraphNode::new(node.id.clone(), node.node_type.clone());
    flat.inputs = inputs;
    if let Some(title) = &node.title {
        flat = flat.with_title(title.clone());
    }
    Ok(flat)
}

/// Widget name → authored value for one node.
fn widget_literals(node: &VisualNode) -> BTreeMap<String, Value> {
    let mut literals = BTreeMap::new();
    match &node.widgets_values {
        Some(Value::Object(map)) => {
            for (name, value) in map {
                // nested objects are editor UI state, not inputs
                if !value.is_object() && !value.is_null() {
                    literals.insert(name.clone(), value.clone());
                }
            }
        }
        Some(Value::Array(values)) => {
            let declared: Vec<&str> = node
                .inputs
                .iter()
                .filter_map(|input| input.widget.as_ref().map(|w| w.name.as_str()))
                .collect();
            // Older editors only list converted widgets as inputs, so a known widget
            // order that covers every declared name is the authoritative position list.
            let known = known_widget_names(&node.node_type);
            let names: Vec<&str> = if declared.iter().all(|name| known.contains(name)) {
                known.to_vec()
            } else {
                declared
            };

            let mut values = values.iter().peekable();
            for name in names {
                let Some(value) = values.next() else { break };
                literals.insert(name.to_string(), value.clone());
                if SEED_FIELDS.contains(&name) {
                    let is_control = values
                        .peek()
                        .and_then(|next| next.as_str())
                        .is_some_and(|next| SEED_CONTROL_VALUES.contains(&next));
                    if is_control {
                        values.next();
                    }
                }
            }
        }
        _ => {}
    }
    literals
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn visual(doc: Value) -> VisualGraph {
        serde_json::from_value(doc).unwrap()
    }

    #[test]
    fn seed_control_companion_is_skipped() {
        let graph = visual(json!({
            "nodes": [{
                "id": 3, "type": "KSampler",
                "widgets_values": [156680208700286_u64, "randomize", 20, 8, "euler", "normal", 1]
            }]
        }));
        let flat = normalize_visual(&graph).unwrap();
        let sampler = flat.get("3").unwrap();
        assert_eq!(sampler.input("steps").and_then(InputValue::as_u64), Some(20));
        assert_eq!(sampler.literal_str("sampler_name"), Some("euler"));
        assert_eq!(sampler.literal_str("scheduler"), Some("normal"));
    }

    #[test]
    fn converted_widget_keeps_remaining_positions() {
        let graph = visual(json!({
            "nodes": [{
                "id": 3, "type": "KSampler",
                "inputs": [
                    {"name": "model", "type": "MODEL", "link": null},
                    {"name": "seed", "type": "INT", "link": null, "widget": {"name": "seed"}}
                ],
                "widgets_values": [42, "randomize", 20, 8, "euler", "normal", 1]
            }]
        }));
        let flat = normalize_visual(&graph).unwrap();
        let sampler = flat.get("3").unwrap();
        assert_eq!(sampler.input("seed").and_then(InputValue::as_u64), Some(42));
        assert_eq!(sampler.input("steps").and_then(InputValue::as_u64), Some(20));
        assert_eq!(sampler.input("cfg").and_then(InputValue::as_u64), Some(8));
        assert_eq!(sampler.literal_str("sampler_name"), Some("euler"));
        assert_eq!(sampler.literal_str("scheduler"), Some("normal"));
        assert_eq!(sampler.input("denoise").and_then(InputValue::as_u64), Some(1));
    }

    #[test]
    fn unknown_type_uses_declared_widget_order() {
        let graph = visual(json!({
            "nodes": [{
                "id": 4, "type": "CustomSampler",
                "inputs": [
                    {"name": "steps", "type": "INT", "link": null, "widget": {"name": "steps"}},
                    {"name": "mood", "type": "STRING", "link": null, "widget": {"name": "mood"}}
                ],
                "widgets_values": [30, "calm"]
            }]
        }));
        let flat = normalize_visual(&graph).unwrap();
        let node = flat.get("4").unwrap();
        assert_eq!(node.input("steps").and_then(InputValue::as_u64), Some(30));
        assert_eq!(node.literal_str("mood"), Some("calm"));
    }

    #[test]
    fn object_widget_values_map_by_name() {
        let graph = visual(json!({
            "nodes": [{
                "id": 8, "type": "VHS_VideoCombine",
                "widgets_values": {"frame_rate": 16, "filename_prefix": "clip", "videopreview": {"hidden": false}}
            }]
        }));
        let flat = normalize_visual(&graph).unwrap();
        let node = flat.get("8").unwrap();
        assert_eq!(node.literal_str("filename_prefix"), Some("clip"));
        assert!(node.input("videopreview").is_none());
    }

    #[test]
    fn only_decorations_is_empty() {
        let graph = visual(json!({
            "nodes": [{"id": 1, "type": "Note"}, {"id": 2, "type": "Reroute"}]
        }));
        let err = normalize_visual(&graph).unwrap_err();
        assert!(matches!(err.kind, GraphErrorKind::EmptyGraph));
    }
}
