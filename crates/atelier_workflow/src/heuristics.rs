//! Role inference for unmapped graphs.
//!
//! Everything here is a pure function of a node (and, for negative-link detection, the
//! graph it sits in). The binder only consults these tables when a role mapping does not
//! name a node.

use atelier_core::{FlatGraph, GraphNode, InputValue, Role};

/// Editor-only node types removed during normalization (compared case-insensitively).
pub const DECORATION_TYPES: &[&str] = &[
    "note",
    "markdownnote",
    "reroute",
    "primitivenode",
    "comment",
    "group",
];

/// Input names that carry prompt text, in lookup order.
pub const TEXT_FIELDS: &[&str] = &["text", "prompt", "positive", "string", "value"];

/// Placeholder tokens marking the slot a template author left for the prompt.
pub const PLACEHOLDER_TOKENS: &[&str] =
    &["{{prompt}}", "{prompt}", "$prompt", "__prompt__", "[prompt]"];

/// Text values treated as "not yet authored".
pub const DEFAULT_TEXTS: &[&str] = &[
    "",
    "prompt",
    "positive",
    "positive prompt",
    "enter prompt",
    "enter prompt here",
    "your prompt here",
    "beautiful scenery nature glass bottle landscape, , purple galaxy bottle,",
];

/// Substrings that mark a text node as a negative or otherwise reserved prompt.
pub const RESERVED_MARKERS: &[&str] = &[
    "negative",
    "worst quality",
    "low quality",
    "lowres",
    "bad anatomy",
    "bad hands",
    "blurry",
    "watermark",
    "deformed",
    "disfigured",
    "jpeg artifacts",
];

/// Canonical image persist-output type.
pub const CANONICAL_SAVE_IMAGE: &str = "SaveImage";

/// Image persist-output types.
pub const SAVE_IMAGE_TYPES: &[&str] = &[CANONICAL_SAVE_IMAGE, "Image Save", "SaveImageExtended"];

/// Video persist-output types.
pub const SAVE_VIDEO_TYPES: &[&str] = &[
    "SaveVideo",
    "VHS_VideoCombine",
    "SaveAnimatedWEBP",
    "SaveAnimatedPNG",
    "SaveWEBM",
];

/// Image loader types that can host a reference image.
pub const LOAD_IMAGE_TYPES: &[&str] = &["LoadImage", "Image Load"];

/// Latent-size and scheduler types carrying `width`/`height`.
pub const LATENT_SIZE_TYPES: &[&str] = &[
    "EmptyLatentImage",
    "EmptySD3LatentImage",
    "EmptyHunyuanLatentVideo",
    "EmptyMochiLatentVideo",
    "EmptyLTXVLatentVideo",
    "EmptyCosmosLatentVideo",
    "WanImageToVideo",
    "WanFirstLastFrameToVideo",
    "ModelSamplingFlux",
];

/// Inputs that receive the per-bind seed.
pub const SEED_FIELDS: &[&str] = &["seed", "noise_seed"];

/// Inputs that carry a frame count, in lookup order.
pub const FRAME_FIELDS: &[&str] = &["length", "frame_count", "num_frames", "frames", "video_frames"];

/// Inputs that carry a longest-side constraint, in lookup order.
pub const MAX_SIDE_FIELDS: &[&str] = &["max_side", "longest_side", "side_length", "size"];

/// Output filename prefix input.
pub const PREFIX_FIELD: &str = "filename_prefix";

/// Loader image input.
pub const IMAGE_FIELD: &str = "image";

/// Companion values editors store after a seed widget.
pub const SEED_CONTROL_VALUES: &[&str] = &["fixed", "increment", "decrement", "randomize"];

/// How a node's text input relates to the prompt slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptCandidate {
    /// No text-bearing literal input
    NotText,
    /// Negative or otherwise reserved text
    Reserved,
    /// Contains a placeholder token
    Placeholder,
    /// Empty or a stock default
    Blank,
    /// Real authored text
    Authored,
}

/// Whether a visual node type is editor-only.
pub fn is_decoration(node_type: &str) -> bool {
    let lower = node_type.trim().to_ascii_lowercase();
    DECORATION_TYPES.contains(&lower.as_str())
}

/// First text-bearing literal input of a node.
pub fn text_field(node: &GraphNode) -> Option<&'static str> {
    TEXT_FIELDS
        .iter()
        .copied()
        .find(|field| node.literal_str(field).is_some())
}

/// First literal input among `fields`, if any.
pub fn first_literal_field(node: &GraphNode, fields: &[&'static str]) -> Option<&'static str> {
    fields.iter().copied().find(|field| {
        node.input(field)
            .is_some_and(|value| !value.is_link())
    })
}

/// Whether text looks like a negative or reserved prompt.
pub fn is_reserved_text(text: &str) -> bool {
    let lower = text.to_lowercase();
    RESERVED_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Whether text contains a prompt placeholder token.
pub fn has_placeholder(text: &str) -> bool {
    let lower = text.to_lowercase();
    PLACEHOLDER_TOKENS.iter().any(|token| lower.contains(token))
}

/// Classify a node's text input for prompt selection.
///
/// # Examples
///
/// ```
/// use atelier_core::GraphNode;
/// use atelier_workflow::{classify_prompt_text, PromptCandidate};
///
/// let slot = GraphNode::new("6", "CLIPTextEncode").with_input("text", serde_json::json!("{prompt}"));
/// assert_eq!(classify_prompt_text(&slot), PromptCandidate::Placeholder);
///
/// let negative = GraphNode::new("7", "CLIPTextEncode")
///     .with_input("text", serde_json::json!("worst quality, lowres"));
/// assert_eq!(classify_prompt_text(&negative), PromptCandidate::Reserved);
/// ```
pub fn classify_prompt_text(node: &GraphNode) -> PromptCandidate {
    let Some(text) = text_field(node).and_then(|field| node.literal_str(field)) else {
        return PromptCandidate::NotText;
    };

    let title_reserved = node
        .title()
        .is_some_and(|title| title.to_lowercase().contains("negative"));
    if title_reserved || is_reserved_text(text) {
        return PromptCandidate::Reserved;
    }
    if has_placeholder(text) {
        return PromptCandidate::Placeholder;
    }
    let normalized = text.trim().to_lowercase();
    if DEFAULT_TEXTS.contains(&normalized.as_str()) {
        return PromptCandidate::Blank;
    }
    PromptCandidate::Authored
}

/// Whether any node feeds `node_id` into an input named `negative`.
pub fn feeds_negative(graph: &FlatGraph, node_id: &str) -> bool {
    graph.iter().any(|node| {
        node.inputs.iter().any(|(name, value)| {
            name.to_lowercase().contains("negative")
                && matches!(value, InputValue::Link(link) if link.node == node_id)
        })
    })
}

/// Roles a node can host when no mapping names it.
///
/// A latent-size node hosts both dimensions; a loader can host any reference role and
/// is assigned by declaration order.
///
/// # Examples
///
/// ```
/// use atelier_core::{GraphNode, Role};
/// use atelier_workflow::infer_roles;
///
/// let save = GraphNode::new("9", "SaveImage");
/// assert_eq!(infer_roles(&save), vec![Role::SaveOutput]);
///
/// let latent = GraphNode::new("5", "EmptyLatentImage")
///     .with_input("width", serde_json::json!(512))
///     .with_input("height", serde_json::json!(512));
/// assert_eq!(infer_roles(&latent), vec![Role::Width, Role::Height]);
/// ```
pub fn infer_roles(node: &GraphNode) -> Vec<Role> {
    let class = node.class_type.as_str();

    if SAVE_IMAGE_TYPES.contains(&class) {
        return vec![Role::SaveOutput];
    }
    if SAVE_VIDEO_TYPES.contains(&class) {
        return vec![Role::VideoSaveOutput];
    }
    if LOAD_IMAGE_TYPES.contains(&class) {
        return vec![
            Role::CharacterReferenceImage,
            Role::SceneReferenceImage,
            Role::FirstFrameImage,
            Role::LastFrameImage,
        ];
    }
    if LATENT_SIZE_TYPES.contains(&class) {
        let mut roles = Vec::new();
        if first_literal_field(node, &["width"]).is_some() {
            roles.push(Role::Width);
        }
        if first_literal_field(node, &["height"]).is_some() {
            roles.push(Role::Height);
        }
        return roles;
    }

    match classify_prompt_text(node) {
        PromptCandidate::Placeholder | PromptCandidate::Blank => vec![Role::PromptInput],
        _ => Vec::new(),
    }
}

/// Nodes of `graph` that can host `role`, in declaration order.
pub fn nodes_for_role(graph: &FlatGraph, role: Role) -> impl Iterator<Item = &GraphNode> {
    graph
        .iter()
        .filter(move |node| infer_roles(node).contains(&role))
}

/// Pick the prompt node of an unmapped graph.
///
/// Only nodes [`infer_roles`] marks as prompt hosts qualify, minus any wired into a
/// `negative` input. Placeholder text wins over blank/default text; within a round the
/// first node in declaration order is taken. Authored text is never overwritten, so a
/// graph without such a node stays prompt-less.
pub fn select_prompt_node(graph: &FlatGraph) -> Option<String> {
    let candidates: Vec<(&GraphNode, PromptCandidate)> = nodes_for_role(graph, Role::PromptInput)
        .filter(|node| !feeds_negative(graph, &node.id))
        .map(|node| (node, classify_prompt_text(node)))
        .collect();

    let round = |wanted: PromptCandidate| {
        candidates
            .iter()
            .find(|(_, candidate)| *candidate == wanted)
            .map(|(node, _)| node.id.clone())
    };

    round(PromptCandidate::Placeholder).or_else(|| round(PromptCandidate::Blank))
}

/// Named widget inputs of common node types, for editor graphs whose input list omits
/// widget-backed slots.
pub fn known_widget_names(node_type: &str) -> &'static [&'static str] {
    match node_type {
        "CLIPTextEncode" => &["text"],
        "KSampler" => &["seed", "steps", "cfg", "sampler_name", "scheduler", "denoise"],
        "KSamplerAdvanced" => &[
            "add_noise",
            "noise_seed",
            "steps",
            "cfg",
            "sampler_name",
            "scheduler",
            "start_at_step",
            "end_at_step",
            "return_with_leftover_noise",
        ],
        "EmptyLatentImage" | "EmptySD3LatentImage" => &["width", "height", "batch_size"],
        "EmptyHunyuanLatentVideo" | "WanImageToVideo" | "WanFirstLastFrameToVideo" => {
            &["width", "height", "length", "batch_size"]
        }
        "SaveImage" => &["filename_prefix"],
        "SaveVideo" => &["filename_prefix", "format", "codec"],
        "LoadImage" => &["image"],
        "CheckpointLoaderSimple" => &["ckpt_name"],
        "VAELoader" => &["vae_name"],
        "UNETLoader" => &["unet_name", "weight_dtype"],
        "LoraLoader" => &["lora_name", "strength_model", "strength_clip"],
        "CreateVideo" => &["fps"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::NodeLink;
    use serde_json::json;

    fn text_node(id: &str, class: &str, text: &str) -> GraphNode {
        GraphNode::new(id, class).with_input("text", json!(text))
    }

    #[test]
    fn prompt_classification_table() {
        let cases = [
            ("CLIPTextEncode", "{{prompt}}", PromptCandidate::Placeholder),
            ("CLIPTextEncode", "a castle, $prompt", PromptCandidate::Placeholder),
            ("CLIPTextEncode", "__PROMPT__", PromptCandidate::Placeholder),
            ("CLIPTextEncode", "", PromptCandidate::Blank),
            ("CLIPTextEncode", "  Positive Prompt ", PromptCandidate::Blank),
            ("CLIPTextEncode", "text, watermark", PromptCandidate::Reserved),
            ("CLIPTextEncode", "blurry, {prompt}", PromptCandidate::Reserved),
            ("CLIPTextEncode", "a red fox in snow", PromptCandidate::Authored),
            ("PrimitiveString", "a red fox in snow", PromptCandidate::Authored),
        ];
        for (class, text, expected) in cases {
            assert_eq!(
                classify_prompt_text(&text_node("1", class, text)),
                expected,
                "{class}: {text:?}"
            );
        }
    }

    #[test]
    fn linked_text_is_not_text() {
        let node = GraphNode::new("1", "CLIPTextEncode").with_input("text", NodeLink::new("2", 0));
        assert_eq!(classify_prompt_text(&node), PromptCandidate::NotText);
    }

    #[test]
    fn negative_title_reserves_blank_node() {
        let node = text_node("1", "CLIPTextEncode", "").with_title("Negative Prompt");
        assert_eq!(classify_prompt_text(&node), PromptCandidate::Reserved);
    }

    #[test]
    fn role_inference_table() {
        let cases = [
            (GraphNode::new("1", "SaveImage"), vec![Role::SaveOutput]),
            (GraphNode::new("1", "VHS_VideoCombine"), vec![Role::VideoSaveOutput]),
            (GraphNode::new("1", "KSampler"), vec![]),
            (
                GraphNode::new("1", "EmptyLatentImage").with_input("width", json!(512)),
                vec![Role::Width],
            ),
            (text_node("1", "CLIPTextEncode", "{prompt}"), vec![Role::PromptInput]),
            (text_node("1", "CLIPTextEncode", "a red fox"), vec![]),
            (text_node("1", "PrimitiveString", ""), vec![Role::PromptInput]),
            (text_node("1", "CLIPTextEncode", "lowres"), vec![]),
        ];
        for (node, expected) in cases {
            assert_eq!(infer_roles(&node), expected, "{}", node.class_type);
        }
        assert_eq!(infer_roles(&GraphNode::new("1", "LoadImage")).len(), 4);
    }

    #[test]
    fn prompt_rounds_prefer_placeholder_then_blank() {
        let graph = FlatGraph::from_nodes(vec![
            text_node("1", "CLIPTextEncode", "a lighthouse"),
            text_node("2", "CLIPTextEncode", ""),
            text_node("3", "CLIPTextEncode", "moody, {prompt}"),
        ])
        .unwrap();
        assert_eq!(select_prompt_node(&graph).as_deref(), Some("3"));

        let graph = FlatGraph::from_nodes(vec![
            text_node("1", "CLIPTextEncode", "a lighthouse"),
            text_node("2", "CLIPTextEncode", ""),
        ])
        .unwrap();
        assert_eq!(select_prompt_node(&graph).as_deref(), Some("2"));

        let graph =
            FlatGraph::from_nodes(vec![text_node("1", "CLIPTextEncode", "a lighthouse")]).unwrap();
        assert_eq!(select_prompt_node(&graph), None);
    }

    #[test]
    fn role_hosts_follow_declaration_order() {
        let graph = FlatGraph::from_nodes(vec![
            GraphNode::new("30", "SaveImage"),
            GraphNode::new("11", "LoadImage"),
            GraphNode::new("9", "SaveImage"),
            GraphNode::new("10", "LoadImage"),
        ])
        .unwrap();
        let saves: Vec<&str> = nodes_for_role(&graph, Role::SaveOutput)
            .map(|node| node.id.as_str())
            .collect();
        assert_eq!(saves, vec!["30", "9"]);
        let loaders: Vec<&str> = nodes_for_role(&graph, Role::FirstFrameImage)
            .map(|node| node.id.as_str())
            .collect();
        assert_eq!(loaders, vec!["11", "10"]);
    }

    #[test]
    fn nodes_wired_into_negative_are_skipped() {
        let graph = FlatGraph::from_nodes(vec![
            text_node("6", "CLIPTextEncode", ""),
            text_node("7", "CLIPTextEncode", ""),
            GraphNode::new("3", "KSampler")
                .with_input("positive", NodeLink::new("7", 0))
                .with_input("negative", NodeLink::new("6", 0)),
        ])
        .unwrap();
        assert_eq!(select_prompt_node(&graph).as_deref(), Some("7"));
    }

    #[test]
    fn nothing_selected_without_candidates() {
        let graph = FlatGraph::from_nodes(vec![
            text_node("1", "CLIPTextEncode", "worst quality"),
            GraphNode::new("2", "SaveImage"),
        ])
        .unwrap();
        assert_eq!(select_prompt_node(&graph), None);
    }

    #[test]
    fn decorations_match_case_insensitively() {
        assert!(is_decoration("Note"));
        assert!(is_decoration("MarkdownNote"));
        assert!(is_decoration("REROUTE"));
        assert!(!is_decoration("KSampler"));
    }
}
