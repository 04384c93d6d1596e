//! End-to-end generation: normalize → bind → upload → submit → poll.

use crate::{
    GenerationMetrics, GenerationStage, ProgressReporter, ProgressUpdate, ReferenceImageUploader,
    ResultPoller, SubmissionClient,
};
use atelier_backend::{AtelierConfig, GenerationBackend};
use atelier_core::{
    ArtifactRef, FlatGraph, GenerationJob, GenerationKind, GenerationRequest, JobState, Role,
    RoleMapping, WorkflowGraph,
};
use atelier_error::{
    AtelierError, AtelierResult, ConfigError, FailureKind, GraphError, GraphErrorKind,
};
use atelier_workflow::{
    BoundGraph, DEFAULT_LONG_SIDE, ParameterBinder, SeedSource, WorkflowStore, WorkflowTemplate,
    normalize,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, instrument, warn};

/// Tunables for an [`Orchestrator`].
#[derive(Debug, Clone, PartialEq, Eq, derive_builder::Builder, derive_getters::Getters)]
#[builder(default)]
pub struct OrchestratorOptions {
    /// Delay between history checks
    poll_interval: Duration,
    /// Polling limit for image kinds
    image_timeout: Duration,
    /// Polling limit for video kinds
    video_timeout: Duration,
    /// Long side for ratio-derived dimensions
    default_long_side: u32,
    /// Seed source for binding
    seed_source: SeedSource,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            image_timeout: Duration::from_secs(120),
            video_timeout: Duration::from_secs(7_200),
            default_long_side: DEFAULT_LONG_SIDE,
            seed_source: SeedSource::Random,
        }
    }
}

impl OrchestratorOptions {
    /// Creates a new builder for `OrchestratorOptions`.
    pub fn builder() -> OrchestratorOptionsBuilder {
        OrchestratorOptionsBuilder::default()
    }

    /// Options taken from loaded configuration.
    pub fn from_config(config: &AtelierConfig) -> Self {
        Self {
            poll_interval: config.polling.interval(),
            image_timeout: config.polling.timeout_for(GenerationKind::Portrait),
            video_timeout: config.polling.timeout_for(GenerationKind::ShotVideo),
            default_long_side: config.binding.max_side,
            seed_source: SeedSource::Random,
        }
    }

    /// Polling limit for a kind.
    pub fn timeout_for(&self, kind: GenerationKind) -> Duration {
        if kind.is_video() {
            self.video_timeout
        } else {
            self.image_timeout
        }
    }
}

/// Structured result of one generation.
///
/// Failures are values, never panics. The bound graph is present whenever binding
/// happened, so callers can inspect or persist exactly what was (or would have been)
/// submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    /// Whether a genuine artifact was produced
    pub success: bool,
    /// The artifact, on success
    pub artifact: Option<ArtifactRef>,
    /// Failure description
    pub message: Option<String>,
    /// Failure classification
    pub failure: Option<FailureKind>,
    /// Graph as bound, when binding happened
    pub bound_graph: Option<BoundGraph>,
    /// Backend job id, when submission succeeded
    pub job_id: Option<String>,
}

impl GenerationOutcome {
    fn failed(err: &AtelierError, bound_graph: Option<BoundGraph>) -> Self {
        Self {
            success: false,
            artifact: None,
            message: Some(err.message()),
            failure: Some(err.failure_kind()),
            bound_graph,
            job_id: None,
        }
    }

    fn from_job(job: GenerationJob, bound_graph: BoundGraph) -> Self {
        let failure = match job.state() {
            JobState::Completed => None,
            JobState::Failed => Some(FailureKind::ExecutionError),
            JobState::TimedOut => Some(FailureKind::Timeout),
            JobState::Submitted | JobState::Polling => Some(FailureKind::Internal),
        };
        Self {
            success: failure.is_none(),
            artifact: job.result_artifact().clone(),
            message: job.error_message().clone(),
            failure,
            bound_graph: Some(bound_graph),
            job_id: Some(job.job_id().clone()),
        }
    }
}

/// Runs generations against one injected backend.
///
/// # Example
///
/// ```no_run
/// use atelier_backend::{BackendConfig, ComfyClient};
/// use atelier_core::{GenerationKind, GenerationRequest};
/// use atelier_generation::Orchestrator;
/// use atelier_workflow::WorkflowTemplate;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Arc::new(ComfyClient::new(BackendConfig::from_env()?)?);
/// let orchestrator = Orchestrator::new(backend);
///
/// let template = WorkflowTemplate::from_json("portrait", &std::fs::read_to_string("portrait.json")?, None)?;
/// let request = GenerationRequest::builder().prompt("an old sailor, oil painting").build()?;
///
/// let outcome = orchestrator.portrait(&template, &request).await;
/// if let Some(artifact) = outcome.artifact {
///     println!("{}", artifact.view_url("http://127.0.0.1:8188")?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Orchestrator {
    backend: Arc<dyn GenerationBackend>,
    options: OrchestratorOptions,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl Orchestrator {
    /// Orchestrator with default options.
    pub fn new(backend: Arc<dyn GenerationBackend>) -> Self {
        Self {
            backend,
            options: OrchestratorOptions::default(),
            progress: None,
        }
    }

    /// Replace the options.
    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Send stage updates to `progress`.
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Get the options
    pub fn options(&self) -> &OrchestratorOptions {
        &self.options
    }

    fn report(&self, stage: GenerationStage) {
        if let Some(progress) = &self.progress {
            progress.report(ProgressUpdate::for_stage(stage));
        }
    }

    /// Character portrait image.
    pub async fn portrait(
        &self,
        template: &WorkflowTemplate,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        self.generate(GenerationKind::Portrait, template, request)
            .await
    }

    /// Scene image.
    pub async fn scene_image(
        &self,
        template: &WorkflowTemplate,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        self.generate(GenerationKind::SceneImage, template, request)
            .await
    }

    /// Shot image.
    pub async fn shot_image(
        &self,
        template: &WorkflowTemplate,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        self.generate(GenerationKind::ShotImage, template, request)
            .await
    }

    /// Shot video. Reference uploads are required.
    pub async fn shot_video(
        &self,
        template: &WorkflowTemplate,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        self.generate(GenerationKind::ShotVideo, template, request)
            .await
    }

    /// Transition video between two frames. Reference uploads are required.
    pub async fn transition_video(
        &self,
        template: &WorkflowTemplate,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        self.generate(GenerationKind::TransitionVideo, template, request)
            .await
    }

    /// Run a stored template.
    pub async fn generate(
        &self,
        kind: GenerationKind,
        template: &WorkflowTemplate,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        self.generate_graph(kind, template.graph(), template.mapping_opt(), request)
            .await
    }

    /// Run the store's default template for `kind`.
    pub async fn generate_default(
        &self,
        store: &dyn WorkflowStore,
        kind: GenerationKind,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        match store.default_for(kind).await {
            Ok(Some(template)) => self.generate(kind, &template, request).await,
            Ok(None) => {
                let err = AtelierError::from(ConfigError::new(format!(
                    "No default workflow configured for {}",
                    kind
                )));
                GenerationOutcome::failed(&err, None)
            }
            Err(err) => GenerationOutcome::failed(&err, None),
        }
    }

    /// Run a graph with an optional role mapping.
    #[instrument(skip_all, fields(%kind))]
    pub async fn generate_graph(
        &self,
        kind: GenerationKind,
        graph: &WorkflowGraph,
        mapping: Option<&RoleMapping>,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        let metrics = GenerationMetrics::get();
        metrics.record_request(kind);
        let started = Instant::now();

        let outcome = self.run(kind, graph, mapping, request).await;

        metrics.record_outcome(kind, outcome.failure, started.elapsed().as_secs_f64());
        self.report(GenerationStage::Finished {
            success: outcome.success,
        });
        match &outcome.failure {
            None => info!(job_id = ?outcome.job_id, "Generation succeeded"),
            Some(failure) => warn!(
                %failure,
                message = outcome.message.as_deref().unwrap_or_default(),
                "Generation failed"
            ),
        }
        outcome
    }

    async fn run(
        &self,
        kind: GenerationKind,
        graph: &WorkflowGraph,
        mapping: Option<&RoleMapping>,
        request: &GenerationRequest,
    ) -> GenerationOutcome {
        self.report(GenerationStage::Binding);
        let flat: FlatGraph = match normalize(graph) {
            Ok(flat) => flat,
            Err(e) => return GenerationOutcome::failed(&e.into(), None),
        };
        if flat.is_empty() {
            let error: AtelierError = GraphError::new(GraphErrorKind::EmptyGraph).into();
            return GenerationOutcome::failed(&error, None);
        }

        let request = request.with_default_prefix(kind.default_prefix());
        let binder = ParameterBinder::new()
            .with_seed_source(self.options.seed_source)
            .with_default_long_side(self.options.default_long_side);
        let bound = binder.bind(&flat, &request, mapping);

        let bound = if request.references().is_empty() {
            bound
        } else {
            self.report(GenerationStage::Uploading);
            let uploader = ReferenceImageUploader::new(Arc::clone(&self.backend));
            match uploader
                .upload_all(request.references(), kind.upload_policy())
                .await
            {
                Ok(uploads) => bound.attach_references(&uploads, mapping),
                Err(e) => return GenerationOutcome::failed(&e, Some(bound)),
            }
        };

        self.report(GenerationStage::Submitting);
        let submission = SubmissionClient::new(Arc::clone(&self.backend));
        let mut job = match submission.submit(&bound).await {
            Ok(job) => job,
            Err(e) => return GenerationOutcome::failed(&e, Some(bound)),
        };

        let save_output = (!kind.is_video())
            .then(|| mapping.and_then(|m| m.node_id(Role::SaveOutput)))
            .flatten()
            .filter(|id| bound.graph().contains(id));

        let poller =
            ResultPoller::new(Arc::clone(&self.backend)).with_interval(self.options.poll_interval);
        if let Err(e) = poller
            .poll(
                &mut job,
                bound.graph(),
                save_output,
                self.options.timeout_for(kind),
                self.progress.as_deref(),
            )
            .await
        {
            let mut outcome = GenerationOutcome::failed(&e, Some(bound));
            outcome.job_id = Some(job.job_id().clone());
            return outcome;
        }

        GenerationOutcome::from_job(job, bound)
    }

    /// Best-effort cancellation of a job.
    ///
    /// Removes the job from the queue, then interrupts the backend. The interrupt stops
    /// whatever is executing, which may be another caller's job.
    #[instrument(skip(self))]
    pub async fn cancel(&self, job_id: &str) -> AtelierResult<()> {
        if let Err(e) = self.backend.delete_queued(job_id).await {
            warn!(error = %e.message(), "Dequeue failed; interrupting anyway");
        }
        self.backend.interrupt().await?;
        info!("Cancellation requested");
        Ok(())
    }
}
