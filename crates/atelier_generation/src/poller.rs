//! Result polling.

use crate::{GenerationStage, ProgressReporter, ProgressUpdate};
use atelier_backend::{GenerationBackend, OutputFile};
use atelier_core::{FlatGraph, GenerationJob};
use atelier_error::AtelierResult;
use atelier_workflow::heuristics::CANONICAL_SAVE_IMAGE;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Default delay between history checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Pick the genuine result among a job's output files.
///
/// Temp-marked files are never candidates. A video anywhere wins. Otherwise, with an
/// explicit save node only its images count; without one the canonical save type is
/// preferred, then the first remaining image.
///
/// The temp filter runs before video priority and covers videos too, so a temp preview
/// clip loses to a saved image.
pub fn select_artifact<'a>(
    files: &'a [OutputFile],
    graph: &FlatGraph,
    save_output: Option<&str>,
) -> Option<&'a OutputFile> {
    let mut candidates = files.iter().filter(|file| !file.is_temp());

    if let Some(video) = candidates.clone().find(|file| file.is_video()) {
        return Some(video);
    }

    if let Some(node_id) = save_output {
        return candidates.find(|file| file.node_id == node_id);
    }

    candidates
        .clone()
        .find(|file| graph.class_type(&file.node_id) == Some(CANONICAL_SAVE_IMAGE))
        .or_else(|| candidates.next())
}

/// Drives a [`GenerationJob`] from `Submitted` to a terminal state.
#[derive(Clone)]
pub struct ResultPoller {
    backend: Arc<dyn GenerationBackend>,
    interval: Duration,
}

impl ResultPoller {
    /// Poller with the default two-second interval.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Use a different tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Poll until the job completes, fails, or `timeout` elapses.
    ///
    /// A tick whose history request fails is logged and counts as "no result yet". The
    /// job never times out before `timeout` has elapsed. `graph` is only consulted for
    /// node operation types.
    ///
    /// # Errors
    ///
    /// Only an illegal state transition (a job that was already terminal) is an error;
    /// every backend outcome is recorded on the job instead.
    #[instrument(skip_all, fields(job_id = %job.job_id(), timeout_secs = timeout.as_secs()))]
    pub async fn poll(
        &self,
        job: &mut GenerationJob,
        graph: &FlatGraph,
        save_output: Option<&str>,
        timeout: Duration,
        progress: Option<&dyn ProgressReporter>,
    ) -> AtelierResult<()> {
        job.begin_polling()?;
        let started = Instant::now();
        let mut ticks = 0u32;

        loop {
            ticks += 1;
            match self.backend.history(job.job_id()).await {
                Ok(Some(entry)) => {
                    if let Some(message) = entry.execution_error() {
                        warn!(%message, ticks, "Backend reported execution error");
                        job.fail(message)?;
                        return Ok(());
                    }
                    let files = entry.output_files();
                    if let Some(file) = select_artifact(&files, graph, save_output) {
                        info!(
                            filename = %file.filename,
                            node_id = %file.node_id,
                            ticks,
                            "Artifact ready"
                        );
                        job.complete(file.to_artifact())?;
                        return Ok(());
                    }
                    debug!(outputs = files.len(), "No genuine artifact yet");
                }
                Ok(None) => debug!("Job has no history yet"),
                Err(e) => warn!(error = %e.message(), "History check failed; will retry"),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                warn!(ticks, elapsed_secs = elapsed.as_secs(), "Polling timed out");
                job.time_out(timeout.as_secs())?;
                return Ok(());
            }

            if let Some(progress) = progress {
                progress.report(ProgressUpdate::for_stage(GenerationStage::Polling {
                    elapsed,
                    timeout,
                }));
            }
            tokio::time::sleep(self.interval.min(timeout - elapsed)).await;
        }
    }
}
