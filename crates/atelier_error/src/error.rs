//! Top-level error wrapper types.

use crate::{
    BackendError, BackendErrorKind, ConfigError, FailureKind, GenerationError,
    GenerationErrorKind, GraphError, GraphErrorKind,
};

/// Every error the Atelier crates can produce.
///
/// # Examples
///
/// ```
/// use atelier_error::{AtelierError, BackendError, BackendErrorKind};
///
/// let backend_err = BackendError::new(BackendErrorKind::Connection("refused".into()));
/// let err: AtelierError = backend_err.into();
/// assert!(format!("{}", err).contains("Backend Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum AtelierErrorKind {
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Graph parsing, normalization, or binding error
    #[from(GraphError)]
    Graph(GraphError),
    /// Remote backend error
    #[from(BackendError)]
    Backend(BackendError),
    /// Generation lifecycle error
    #[from(GenerationError)]
    Generation(GenerationError),
}

/// Atelier error with kind discrimination.
///
/// # Examples
///
/// ```
/// use atelier_error::{AtelierResult, ConfigError};
///
/// fn might_fail() -> AtelierResult<()> {
///     Err(ConfigError::new("Missing field"))?
/// }
///
/// assert!(might_fail().is_err());
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Atelier Error: {}", _0)]
pub struct AtelierError(Box<AtelierErrorKind>);

impl AtelierError {
    /// Create a new error from a kind.
    pub fn new(kind: AtelierErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &AtelierErrorKind {
        &self.0
    }

    /// Classify this error into the caller-facing failure taxonomy.
    pub fn failure_kind(&self) -> FailureKind {
        match self.kind() {
            AtelierErrorKind::Config(_) => FailureKind::Configuration,
            AtelierErrorKind::Graph(e) => match e.kind {
                GraphErrorKind::EmptyGraph => FailureKind::EmptyGraph,
                GraphErrorKind::NodeNotFound(_) => FailureKind::NodeNotFound,
                GraphErrorKind::UnrecognizedShape(_)
                | GraphErrorKind::MalformedNode(_)
                | GraphErrorKind::MalformedLink(_)
                | GraphErrorKind::InvalidRoleMapping(_) => FailureKind::InvalidGraph,
            },
            AtelierErrorKind::Backend(e) => match e.kind {
                BackendErrorKind::Connection(_) => FailureKind::ConnectionError,
                BackendErrorKind::SubmissionRejected(_) => FailureKind::SubmissionRejected,
                BackendErrorKind::UploadRejected { .. } | BackendErrorKind::Io(_) => {
                    FailureKind::ReferenceUploadFailed
                }
                BackendErrorKind::InvalidUrl(_) => FailureKind::Configuration,
                BackendErrorKind::Api { .. } | BackendErrorKind::UnexpectedResponse(_) => {
                    FailureKind::Internal
                }
            },
            AtelierErrorKind::Generation(e) => match e.kind {
                GenerationErrorKind::ReferenceUploadFailed(_) => {
                    FailureKind::ReferenceUploadFailed
                }
                GenerationErrorKind::ExecutionError(_) => FailureKind::ExecutionError,
                GenerationErrorKind::Timeout(_) => FailureKind::Timeout,
                GenerationErrorKind::InvalidTransition { .. } => FailureKind::Internal,
            },
        }
    }

    /// The innermost human-readable message, without location decoration.
    pub fn message(&self) -> String {
        match self.kind() {
            AtelierErrorKind::Config(e) => e.message.clone(),
            AtelierErrorKind::Graph(e) => e.kind.to_string(),
            AtelierErrorKind::Backend(e) => e.kind.to_string(),
            AtelierErrorKind::Generation(e) => e.kind.to_string(),
        }
    }
}

// Generic From implementation for any type that converts to AtelierErrorKind
impl<T> From<T> for AtelierError
where
    T: Into<AtelierErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Atelier operations.
pub type AtelierResult<T> = std::result::Result<T, AtelierError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_graph_errors() {
        let err: AtelierError = GraphError::new(GraphErrorKind::EmptyGraph).into();
        assert_eq!(err.failure_kind(), FailureKind::EmptyGraph);

        let err: AtelierError =
            GraphError::new(GraphErrorKind::UnrecognizedShape("array".into())).into();
        assert_eq!(err.failure_kind(), FailureKind::InvalidGraph);

        let err: AtelierError =
            GraphError::new(GraphErrorKind::MalformedLink("link 0: too short".into())).into();
        assert_eq!(err.failure_kind(), FailureKind::InvalidGraph);
    }

    #[test]
    fn classifies_backend_errors() {
        let err: AtelierError =
            BackendError::new(BackendErrorKind::SubmissionRejected("no outputs".into())).into();
        assert_eq!(err.failure_kind(), FailureKind::SubmissionRejected);
        assert_eq!(err.message(), "Submission rejected: no outputs");
    }

    #[test]
    fn classifies_generation_errors() {
        let err: AtelierError = GenerationError::new(GenerationErrorKind::Timeout(120)).into();
        assert_eq!(err.failure_kind(), FailureKind::Timeout);

        let err: AtelierError =
            GenerationError::new(GenerationErrorKind::ExecutionError("OOM".into())).into();
        assert_eq!(err.failure_kind(), FailureKind::ExecutionError);
    }
}
