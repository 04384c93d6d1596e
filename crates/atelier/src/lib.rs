//! Atelier - node-graph workflow binding and generation orchestration
//!
//! Atelier takes a stored node-graph workflow (in either the executable or the editor
//! shape), writes a generation request into it, and runs it on a ComfyUI-compatible
//! server until a genuine image or video artifact comes back.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use atelier::{
//!     AtelierConfig, ComfyClient, GenerationRequest, Orchestrator, OrchestratorOptions,
//!     WorkflowTemplate, init_telemetry, TelemetryConfig,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_telemetry(&TelemetryConfig::default())?;
//!
//!     let config = AtelierConfig::load()?;
//!     let backend = Arc::new(ComfyClient::new(config.backend.clone())?);
//!     let orchestrator =
//!         Orchestrator::new(backend).with_options(OrchestratorOptions::from_config(&config));
//!
//!     let template = WorkflowTemplate::from_json(
//!         "portrait",
//!         &std::fs::read_to_string("portrait.json")?,
//!         None,
//!     )?;
//!     let request = GenerationRequest::builder().prompt("a lighthouse keeper").build()?;
//!
//!     let outcome = orchestrator.portrait(&template, &request).await;
//!     println!("{:?}", outcome.artifact);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `atelier_error` - Error types and the failure taxonomy
//! - `atelier_core` - Graphs, roles, requests, artifacts, job state machine
//! - `atelier_workflow` - Normalization, heuristics, parameter binding, template store
//! - `atelier_backend` - Backend trait, HTTP client, configuration
//! - `atelier_generation` - Uploads, submission, polling, orchestration
//!
//! This crate re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod telemetry;

pub use atelier_backend::*;
pub use atelier_core::*;
pub use atelier_error::*;
pub use atelier_generation::*;
pub use atelier_workflow::*;

pub use telemetry::{DEFAULT_LOG_FILTER, TelemetryConfig, init_telemetry};
