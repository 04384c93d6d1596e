//! The backend seam used by the generation pipeline.

use crate::{HistoryEntry, UploadedImage};
use async_trait::async_trait;
use atelier_core::FlatGraph;
use atelier_error::AtelierResult;

/// Remote node-graph execution service.
///
/// [`ComfyClient`](crate::ComfyClient) is the HTTP implementation; tests substitute
/// in-process fakes.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Queue a graph for execution and return the job id. Never retries.
    async fn submit(&self, graph: &FlatGraph) -> AtelierResult<String>;

    /// Current history record of a job, `None` while it has none.
    async fn history(&self, job_id: &str) -> AtelierResult<Option<HistoryEntry>>;

    /// Store an image in the backend's input area.
    async fn upload_image(&self, filename: &str, bytes: Vec<u8>) -> AtelierResult<UploadedImage>;

    /// Remove a queued job.
    async fn delete_queued(&self, job_id: &str) -> AtelierResult<()>;

    /// Stop whatever the backend is executing right now.
    ///
    /// Affects every running job on the backend, not only ours.
    async fn interrupt(&self) -> AtelierResult<()>;

    /// Check the backend is reachable.
    async fn health_check(&self) -> AtelierResult<()>;

    /// Base URL artifacts are served from.
    fn base_url(&self) -> &str;
}
