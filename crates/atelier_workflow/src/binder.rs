//! Parameter binding: request + mapping + template → bound graph.

use crate::heuristics::{
    FRAME_FIELDS, IMAGE_FIELD, MAX_SIDE_FIELDS, PREFIX_FIELD, SEED_FIELDS, first_literal_field,
    nodes_for_role, select_prompt_node, text_field,
};
use atelier_core::{FlatGraph, GenerationRequest, InputValue, Role, RoleMapping, RoleTarget};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, instrument, warn};

/// Default long side used when dimensions derive from an aspect ratio.
pub const DEFAULT_LONG_SIDE: u32 = 1024;

/// Where per-bind seeds come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SeedSource {
    /// Fresh random `u32` per bind
    #[default]
    Random,
    /// Always the same value, for reproducible binds
    Fixed(u32),
}

impl SeedSource {
    /// Draw one seed.
    pub fn draw(&self) -> u32 {
        match self {
            SeedSource::Random => rand::random(),
            SeedSource::Fixed(seed) => *seed,
        }
    }
}

/// A mapped role whose node does not exist in the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRole {
    /// Role that fell back to heuristics
    pub role: Role,
    /// The missing node id
    pub node_id: String,
}

/// An uploaded reference image ready to be attached to a loader node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedReference {
    /// Loader role the image fills
    pub role: Role,
    /// Backend-assigned handle
    pub handle: String,
}

impl UploadedReference {
    /// Create an uploaded reference.
    pub fn new(role: Role, handle: impl Into<String>) -> Self {
        Self {
            role,
            handle: handle.into(),
        }
    }
}

/// A template with one request applied. Always an independent copy.
#[derive(Debug, Clone, PartialEq, derive_getters::Getters)]
pub struct BoundGraph {
    /// The executable graph
    graph: FlatGraph,
    /// Seed written into every seed input
    seed: u32,
    /// Node that received the prompt, if any
    prompt_node: Option<String>,
    /// Loader nodes that received reference handles
    reference_nodes: Vec<(Role, String)>,
    /// Mapped roles whose node was missing
    unresolved: Vec<UnresolvedRole>,
}

impl BoundGraph {
    /// Consume into the executable graph.
    pub fn into_graph(self) -> FlatGraph {
        self.graph
    }

    /// Wire form for submission.
    pub fn to_value(&self) -> Value {
        self.graph.to_value()
    }

    /// Second binding phase: write uploaded handles into loader nodes.
    ///
    /// Mapped reference roles go to their node's `image` input. Remaining handles fill
    /// loader nodes not claimed by the mapping, in declaration order. Handles left over
    /// once loaders run out are dropped with a warning.
    #[instrument(skip_all, fields(uploads = uploads.len()))]
    pub fn attach_references(
        &self,
        uploads: &[UploadedReference],
        mapping: Option<&RoleMapping>,
    ) -> BoundGraph {
        let mut bound = self.clone();

        let claimed: HashSet<String> = mapping
            .into_iter()
            .flat_map(RoleMapping::iter)
            .filter(|(role, target)| {
                role.is_reference_image() && bound.graph.contains(&target.node_id)
            })
            .map(|(_, target)| target.node_id.clone())
            .collect();

        let mut unmapped = Vec::new();
        for upload in uploads {
            match resolve(&bound.graph, mapping, upload.role, &mut bound.unresolved) {
                Some(target) => {
                    let field = target.field.as_deref().unwrap_or(IMAGE_FIELD);
                    if let Some(node) = bound.graph.get_mut(&target.node_id) {
                        node.set_literal(field, upload.handle.as_str());
                        bound
                            .reference_nodes
                            .push((upload.role, target.node_id.clone()));
                    }
                }
                None => unmapped.push(upload),
            }
        }

        let mut taken = claimed;
        let mut dropped = 0usize;
        for upload in unmapped {
            let free = nodes_for_role(&bound.graph, upload.role)
                .find(|node| !taken.contains(&node.id))
                .map(|node| node.id.clone());
            let Some(node_id) = free else {
                dropped += 1;
                continue;
            };
            if let Some(node) = bound.graph.get_mut(&node_id) {
                node.set_literal(IMAGE_FIELD, upload.handle.as_str());
                debug!(role = %upload.role, node_id = %node_id, "Attached reference by order");
                bound.reference_nodes.push((upload.role, node_id.clone()));
            }
            taken.insert(node_id);
        }

        if dropped > 0 {
            warn!(
                dropped,
                "More reference images than free loader nodes; extra images are dropped"
            );
        }
        bound
    }
}

/// Applies a [`GenerationRequest`] to a template graph.
///
/// # Examples
///
/// ```
/// use atelier_core::{FlatGraph, GenerationRequest};
/// use atelier_workflow::{ParameterBinder, SeedSource};
///
/// let template = FlatGraph::from_json(r#"{
///     "3": {"class_type": "KSampler", "inputs": {"seed": 0, "steps": 20}},
///     "6": {"class_type": "CLIPTextEncode", "inputs": {"text": "{prompt}"}},
///     "9": {"class_type": "SaveImage", "inputs": {"filename_prefix": "ComfyUI"}}
/// }"#).unwrap();
/// let request = GenerationRequest::builder()
///     .prompt("a lighthouse at dusk")
///     .filename_prefix("scene")
///     .build()
///     .unwrap();
///
/// let bound = ParameterBinder::new()
///     .with_seed_source(SeedSource::Fixed(7))
///     .bind(&template, &request, None);
///
/// let graph = bound.graph();
/// assert_eq!(graph.get("6").unwrap().literal_str("text"), Some("a lighthouse at dusk"));
/// assert_eq!(graph.get("9").unwrap().literal_str("filename_prefix"), Some("scene"));
/// assert_eq!(*bound.seed(), 7);
/// assert_eq!(template.get("6").unwrap().literal_str("text"), Some("{prompt}"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterBinder {
    seed_source: SeedSource,
    default_long_side: u32,
}

impl Default for ParameterBinder {
    fn default() -> Self {
        Self::new()
    }
}

impl ParameterBinder {
    /// Binder with random seeds and a 1024px default long side.
    pub fn new() -> Self {
        Self {
            seed_source: SeedSource::Random,
            default_long_side: DEFAULT_LONG_SIDE,
        }
    }

    /// Use a different seed source.
    pub fn with_seed_source(mut self, seed_source: SeedSource) -> Self {
        self.seed_source = seed_source;
        self
    }

    /// Long side used when dimensions come from an aspect ratio without `max_side`.
    pub fn with_default_long_side(mut self, long_side: u32) -> Self {
        self.default_long_side = long_side;
        self
    }

    /// First binding phase: every scalar parameter plus the seed.
    ///
    /// The template is never modified. Mapped ids missing from the template are logged,
    /// recorded in [`BoundGraph::unresolved`], and fall back to heuristics.
    #[instrument(skip_all, fields(mapped = mapping.map(|m| !m.is_empty()).unwrap_or(false)))]
    pub fn bind(
        &self,
        template: &FlatGraph,
        request: &GenerationRequest,
        mapping: Option<&RoleMapping>,
    ) -> BoundGraph {
        let mut graph = template.clone();
        let mut unresolved = Vec::new();

        let prompt_node = bind_prompt(
            &mut graph,
            request.prompt(),
            resolve(template, mapping, Role::PromptInput, &mut unresolved),
        );

        if let Some(prefix) = request.filename_prefix() {
            for role in [Role::SaveOutput, Role::VideoSaveOutput] {
                bind_prefix(
                    &mut graph,
                    prefix,
                    role,
                    resolve(template, mapping, role, &mut unresolved),
                );
            }
        }

        let (width, height) = request.dimensions(self.default_long_side);
        if let Some(width) = width {
            bind_dimension(
                &mut graph,
                Role::Width,
                width,
                resolve(template, mapping, Role::Width, &mut unresolved),
            );
        }
        if let Some(height) = height {
            bind_dimension(
                &mut graph,
                Role::Height,
                height,
                resolve(template, mapping, Role::Height, &mut unresolved),
            );
        }

        if let Some(frames) = request.frame_count() {
            bind_mapped_only(
                &mut graph,
                *frames,
                FRAME_FIELDS,
                resolve(template, mapping, Role::FrameCount, &mut unresolved),
            );
        }
        if let Some(max_side) = request.max_side() {
            bind_mapped_only(
                &mut graph,
                *max_side,
                MAX_SIDE_FIELDS,
                resolve(template, mapping, Role::MaxSide, &mut unresolved),
            );
        }

        let seed = self.seed_source.draw();
        let seeded = bind_seed(&mut graph, seed);
        debug!(seed, seeded, prompt_node = ?prompt_node, "Bound scalar parameters");

        BoundGraph {
            graph,
            seed,
            prompt_node,
            reference_nodes: Vec::new(),
            unresolved,
        }
    }
}

/// Mapped target for a role, if it exists in the graph.
fn resolve<'m>(
    graph: &FlatGraph,
    mapping: Option<&'m RoleMapping>,
    role: Role,
    unresolved: &mut Vec<UnresolvedRole>,
) -> Option<&'m RoleTarget> {
    let target = mapping?.get(role)?;
    if graph.contains(&target.node_id) {
        return Some(target);
    }
    warn!(
        role = %role,
        node_id = %target.node_id,
        "Mapped node not found; falling back to heuristics"
    );
    if !unresolved
        .iter()
        .any(|u: &UnresolvedRole| u.role == role && u.node_id == target.node_id)
    {
        unresolved.push(UnresolvedRole {
            role,
            node_id: target.node_id.clone(),
        });
    }
    None
}

fn bind_prompt(graph: &mut FlatGraph, prompt: &str, target: Option<&RoleTarget>) -> Option<String> {
    let (node_id, field) = match target {
        Some(target) => (target.node_id.clone(), target.field.clone()),
        None => match select_prompt_node(graph) {
            Some(node_id) => (node_id, None),
            None => {
                debug!("No prompt node found; graph stays prompt-less");
                return None;
            }
        },
    };

    let node = graph.get_mut(&node_id)?;
    let field = field
        .or_else(|| text_field(node).map(str::to_string))
        .unwrap_or_else(|| "text".to_string());
    node.set_literal(field, prompt);
    Some(node_id)
}

/// Write `value` into `field` on the mapped node, or on every node the heuristics say
/// hosts `role`.
fn bind_role_literal(
    graph: &mut FlatGraph,
    role: Role,
    field: &str,
    value: impl Into<Value> + Clone,
    target: Option<&RoleTarget>,
) {
    let targets: Vec<(String, String)> = match target {
        Some(target) => vec![(
            target.node_id.clone(),
            target.field.clone().unwrap_or_else(|| field.to_string()),
        )],
        None => nodes_for_role(graph, role)
            .map(|node| (node.id.clone(), field.to_string()))
            .collect(),
    };
    for (node_id, field) in targets {
        if let Some(node) = graph.get_mut(&node_id) {
            node.set_literal(field, value.clone());
        }
    }
}

fn bind_prefix(graph: &mut FlatGraph, prefix: &str, role: Role, target: Option<&RoleTarget>) {
    bind_role_literal(graph, role, PREFIX_FIELD, prefix, target);
}

fn bind_dimension(graph: &mut FlatGraph, role: Role, value: u32, target: Option<&RoleTarget>) {
    let field = if role == Role::Width { "width" } else { "height" };
    bind_role_literal(graph, role, field, value, target);
}

fn bind_mapped_only(
    graph: &mut FlatGraph,
    value: u32,
    fields: &[&'static str],
    target: Option<&RoleTarget>,
) {
    let Some(target) = target else { return };
    let Some(node) = graph.get_mut(&target.node_id) else {
        return;
    };
    let field = target
        .field
        .clone()
        .or_else(|| first_literal_field(node, fields).map(str::to_string))
        .unwrap_or_else(|| fields[0].to_string());
    node.set_literal(field, value);
}

/// Write `seed` into every literal seed input. Returns how many inputs were set.
fn bind_seed(graph: &mut FlatGraph, seed: u32) -> usize {
    let mut count = 0;
    for node in graph.iter_mut() {
        for field in SEED_FIELDS {
            if matches!(node.input(field), Some(InputValue::Literal(v)) if v.is_number()) {
                node.set_literal(*field, seed);
                count += 1;
            }
        }
    }
    count
}
