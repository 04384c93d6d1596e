//! Generation lifecycle error types.

/// Kinds of failures raised while a generation job runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GenerationErrorKind {
    /// A reference image required by the workflow could not be uploaded
    #[display("Reference upload failed: {}", _0)]
    ReferenceUploadFailed(String),
    /// The backend reported a node failure while executing the job
    #[display("Execution error: {}", _0)]
    ExecutionError(String),
    /// No genuine artifact appeared within the allotted window
    #[display("Timed out after {} seconds", _0)]
    Timeout(u64),
    /// A job state machine was asked to leave a terminal state
    #[display("Invalid job transition from {} to {}", from, to)]
    InvalidTransition {
        /// Current state
        from: String,
        /// Requested state
        to: String,
    },
}

/// Generation error with location tracking.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Generation Error: {} at line {} in {}", kind, line, file)]
pub struct GenerationError {
    /// The kind of error that occurred
    pub kind: GenerationErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GenerationError {
    /// Create a new generation error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GenerationErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
