//! Graph submission.

use atelier_backend::GenerationBackend;
use atelier_core::GenerationJob;
use atelier_error::AtelierResult;
use atelier_workflow::BoundGraph;
use std::sync::Arc;
use tracing::{info, instrument};

/// Queues bound graphs on the backend. Never retries.
#[derive(Clone)]
pub struct SubmissionClient {
    backend: Arc<dyn GenerationBackend>,
}

impl SubmissionClient {
    /// Create a submission client over a backend.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self { backend }
    }

    /// Submit a bound graph and return the freshly created job.
    #[instrument(skip(self, bound), fields(seed = *bound.seed()))]
    pub async fn submit(&self, bound: &BoundGraph) -> AtelierResult<GenerationJob> {
        let job_id = self.backend.submit(bound.graph()).await?;
        info!(%job_id, "Job queued");
        Ok(GenerationJob::new(job_id))
    }
}
