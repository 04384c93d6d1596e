//! Generation job state machine.

use crate::ArtifactRef;
use atelier_error::{GenerationError, GenerationErrorKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a remote job.
///
/// `Submitted → Polling → {Completed | Failed | TimedOut}`; terminal states have no
/// outgoing transition.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    /// Accepted by the backend, not yet observed
    Submitted,
    /// Being polled
    Polling,
    /// Genuine artifact found
    Completed,
    /// Backend reported an execution error
    Failed,
    /// No genuine artifact within the window
    TimedOut,
}

impl JobState {
    /// Whether no further transition is possible.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::TimedOut
        )
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        match self {
            JobState::Submitted => next == JobState::Polling,
            JobState::Polling => next.is_terminal(),
            JobState::Completed | JobState::Failed | JobState::TimedOut => false,
        }
    }
}

/// One asynchronous unit of remote execution.
///
/// Created when a submission is accepted and advanced only by the result poller.
///
/// # Examples
///
/// ```
/// use atelier_core::{ArtifactKind, ArtifactRef, GenerationJob, JobState};
///
/// let mut job = GenerationJob::new("6f1c");
/// job.begin_polling().unwrap();
/// job.complete(ArtifactRef::new(ArtifactKind::Image, "out.png", "", "output")).unwrap();
///
/// assert_eq!(*job.state(), JobState::Completed);
/// assert!(job.fail("late error").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct GenerationJob {
    /// Backend-assigned job id
    job_id: String,
    /// Current state
    state: JobState,
    /// Genuine artifact, once completed
    result_artifact: Option<ArtifactRef>,
    /// Failure description, once failed or timed out
    error_message: Option<String>,
    /// When the submission was accepted
    submitted_at: DateTime<Utc>,
    /// When a terminal state was reached
    finished_at: Option<DateTime<Utc>>,
}

impl GenerationJob {
    /// A freshly submitted job.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Submitted,
            result_artifact: None,
            error_message: None,
            submitted_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Whether the job has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// `Submitted → Polling`. Calling it while already polling is a no-op.
    pub fn begin_polling(&mut self) -> Result<(), GenerationError> {
        if self.state == JobState::Polling {
            return Ok(());
        }
        self.transition(JobState::Polling)
    }

    /// `Polling → Completed`.
    pub fn complete(&mut self, artifact: ArtifactRef) -> Result<(), GenerationError> {
        self.transition(JobState::Completed)?;
        self.result_artifact = Some(artifact);
        Ok(())
    }

    /// `Polling → Failed`.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), GenerationError> {
        self.transition(JobState::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// `Polling → TimedOut`.
    pub fn time_out(&mut self, timeout_secs: u64) -> Result<(), GenerationError> {
        self.transition(JobState::TimedOut)?;
        self.error_message = Some(format!(
            "No result within {} seconds; the backend may still be running the job",
            timeout_secs
        ));
        Ok(())
    }

    #[track_caller]
    fn transition(&mut self, next: JobState) -> Result<(), GenerationError> {
        if !self.state.can_transition_to(next) {
            return Err(GenerationError::new(
                GenerationErrorKind::InvalidTransition {
                    from: self.state.to_string(),
                    to: next.to_string(),
                },
            ));
        }
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}
