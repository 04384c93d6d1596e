//! Node-graph error types.

/// Kinds of errors raised while parsing, normalizing, or binding a node graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum GraphErrorKind {
    /// A visual graph had no executable nodes left after dropping decorations
    #[display("Graph has no executable nodes")]
    EmptyGraph,
    /// The document is neither a visual nor a flat graph
    #[display("Unrecognized graph shape: {}", _0)]
    UnrecognizedShape(String),
    /// A node entry could not be interpreted
    #[display("Malformed node: {}", _0)]
    MalformedNode(String),
    /// A link entry could not be interpreted
    #[display("Malformed link: {}", _0)]
    MalformedLink(String),
    /// A role mapping points at a node id absent from the graph
    #[display("Node not found: {}", _0)]
    NodeNotFound(String),
    /// A role mapping document could not be interpreted
    #[display("Invalid role mapping: {}", _0)]
    InvalidRoleMapping(String),
}

/// Graph error with location tracking.
///
/// # Examples
///
/// ```
/// use atelier_error::{GraphError, GraphErrorKind};
///
/// let err = GraphError::new(GraphErrorKind::EmptyGraph);
/// assert!(format!("{}", err).contains("no executable nodes"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Graph Error: {} at line {} in {}", kind, line, file)]
pub struct GraphError {
    /// The kind of error that occurred
    pub kind: GraphErrorKind,
    /// Line number where error was created
    pub line: u32,
    /// File where error was created
    pub file: &'static str,
}

impl GraphError {
    /// Create a new graph error with automatic location tracking.
    #[track_caller]
    pub fn new(kind: GraphErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }
}
