//! Remote generation backend error types.

/// Error kinds for backend HTTP operations.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, derive_more::Display)]
pub enum BackendErrorKind {
    /// The backend could not be reached
    #[display("Connection error: {}", _0)]
    Connection(String),

    /// The backend refused a submitted graph
    #[display("Submission rejected: {}", _0)]
    SubmissionRejected(String),

    /// The backend refused an uploaded image
    #[display("Upload rejected ({}): {}", status, message)]
    UploadRejected {
        /// HTTP status code
        status: u16,
        /// Response body or extracted message
        message: String,
    },

    /// Any other non-success status
    #[display("API error ({}): {}", status, message)]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body or extracted message
        message: String,
    },

    /// A response body did not have the expected shape
    #[display("Unexpected response: {}", _0)]
    UnexpectedResponse(String),

    /// Local file access failed
    #[display("I/O error: {}", _0)]
    Io(String),

    /// The configured base URL is unusable
    #[display("Invalid URL: {}", _0)]
    InvalidUrl(String),
}

/// Backend error with location tracking.
///
/// # Examples
///
/// ```
/// use atelier_error::{BackendError, BackendErrorKind};
///
/// let err = BackendError::new(BackendErrorKind::SubmissionRejected("bad node".into()));
/// assert!(format!("{}", err).contains("bad node"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Backend Error: {} at line {} in {}", kind, line, file)]
pub struct BackendError {
    /// The error kind
    pub kind: BackendErrorKind,
    /// Line number where error occurred
    pub line: u32,
    /// File where error occurred
    pub file: &'static str,
}

impl BackendError {
    /// Create a new BackendError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: BackendErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
