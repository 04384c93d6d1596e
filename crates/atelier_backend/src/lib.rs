//! Backend access for Atelier.
//!
//! This crate owns everything that talks to the remote node-graph server:
//!
//! - [`GenerationBackend`]: the async seam the generation pipeline depends on
//! - [`ComfyClient`]: the `reqwest` implementation (`/prompt`, `/history`, `/upload/image`,
//!   `/queue`, `/interrupt`, `/system_stats`)
//! - wire types for submissions, uploads, and history records
//! - [`AtelierConfig`]: layered configuration loading

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod dto;
mod traits;

pub use client::ComfyClient;
pub use config::{AtelierConfig, BackendConfig, BindingConfig, DEFAULT_BASE_URL, PollingConfig};
pub use dto::{
    HistoryEntry, HistoryStatus, OutputFile, PromptAccepted, PromptSubmission, TEMP_MARKER,
    UploadedImage, VIDEO_EXTENSIONS, VIDEO_OUTPUT_KEYS, rejection_message,
    summarize_node_errors,
};
pub use traits::GenerationBackend;
