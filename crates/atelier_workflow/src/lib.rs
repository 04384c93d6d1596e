//! Workflow normalization and parameter binding.
//!
//! Turns a stored workflow template into a graph ready for submission:
//!
//! 1. [`normalize`] converts editor graphs into the flat executable form.
//! 2. [`ParameterBinder::bind`] applies a generation request, preferring the template's
//!    role mapping and falling back to the heuristics in [`heuristics`].
//! 3. [`BoundGraph::attach_references`] writes uploaded reference-image handles into
//!    loader nodes once they exist.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod binder;
pub mod heuristics;
mod normalize;
mod template;

pub use binder::{
    BoundGraph, DEFAULT_LONG_SIDE, ParameterBinder, SeedSource, UnresolvedRole,
    UploadedReference,
};
pub use heuristics::{
    PromptCandidate, classify_prompt_text, infer_roles, nodes_for_role, select_prompt_node,
};
pub use normalize::{normalize, normalize_visual};
pub use template::{InMemoryWorkflowStore, WorkflowStore, WorkflowTemplate};
