//! Core data types for the Atelier generation orchestrator.
//!
//! This crate provides the foundation data types shared by every Atelier crate: the two
//! accepted node-graph shapes, role mappings, generation requests, artifact references,
//! and the generation job state machine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod artifact;
mod graph;
mod job;
mod kind;
mod request;
mod role;
mod visual;

pub use artifact::{ArtifactKind, ArtifactRef};
pub use graph::{FlatGraph, GraphNode, InputValue, NodeLink, WorkflowGraph};
pub use job::{GenerationJob, JobState};
pub use kind::{GenerationKind, UploadPolicy};
pub use request::{
    AspectRatio, GenerationRequest, GenerationRequestBuilder, GenerationRequestBuilderError,
    ReferenceImage,
};
pub use role::{Role, RoleMapping, RoleTarget};
pub use visual::{VisualGraph, VisualInput, VisualLink, VisualNode, WidgetRef};
