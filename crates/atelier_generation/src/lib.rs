//! Generation orchestration for Atelier.
//!
//! An [`Orchestrator`] runs one generation end to end against an injected
//! [`GenerationBackend`](atelier_backend::GenerationBackend):
//!
//! 1. normalize and bind the workflow
//! 2. upload reference images under the kind's [`UploadPolicy`](atelier_core::UploadPolicy)
//! 3. submit the bound graph ([`SubmissionClient`])
//! 4. poll for the genuine artifact ([`ResultPoller`])
//!
//! Every step is sequential within one call; separate calls share nothing but the backend
//! client.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod metrics;
mod orchestrator;
mod poller;
mod progress;
mod submission;
mod uploader;

pub use metrics::GenerationMetrics;
pub use orchestrator::{
    GenerationOutcome, Orchestrator, OrchestratorOptions, OrchestratorOptionsBuilder,
    OrchestratorOptionsBuilderError,
};
pub use poller::{DEFAULT_POLL_INTERVAL, ResultPoller, select_artifact};
pub use progress::{GenerationStage, ProgressReporter, ProgressUpdate};
pub use submission::SubmissionClient;
pub use uploader::ReferenceImageUploader;
