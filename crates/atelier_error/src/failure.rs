//! Caller-facing failure taxonomy.

/// Classification of a failed generation, suitable for a task record.
///
/// # Examples
///
/// ```
/// use atelier_error::FailureKind;
///
/// assert_eq!(FailureKind::SubmissionRejected.to_string(), "submission_rejected");
/// assert!(FailureKind::NodeNotFound.is_recoverable());
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    /// Visual graph had no executable nodes
    EmptyGraph,
    /// Graph or role mapping document could not be parsed
    InvalidGraph,
    /// A mapped role pointed at a missing node
    NodeNotFound,
    /// Backend unreachable
    ConnectionError,
    /// Backend refused the graph
    SubmissionRejected,
    /// Required reference image upload failed
    ReferenceUploadFailed,
    /// Backend reported a node failure
    ExecutionError,
    /// No genuine artifact within the window
    Timeout,
    /// Configuration could not be loaded
    Configuration,
    /// Anything that does not fit the categories above
    Internal,
}

impl FailureKind {
    /// Whether this kind is logged and tolerated rather than surfaced as a failure.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FailureKind::NodeNotFound)
    }
}
