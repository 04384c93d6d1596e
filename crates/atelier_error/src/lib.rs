//! Error types for the Atelier library.
//!
//! This crate provides the foundation error types used throughout the Atelier workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! At the orchestrator boundary every error collapses into a [`FailureKind`], the
//! caller-facing failure taxonomy.
//!
//! # Examples
//!
//! ```
//! use atelier_error::{AtelierResult, BackendError, BackendErrorKind, FailureKind};
//!
//! fn submit() -> AtelierResult<String> {
//!     Err(BackendError::new(BackendErrorKind::Connection("refused".into())))?
//! }
//!
//! let err = submit().unwrap_err();
//! assert_eq!(err.failure_kind(), FailureKind::ConnectionError);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod config;
mod error;
mod failure;
mod generation;
mod graph;

pub use backend::{BackendError, BackendErrorKind};
pub use config::ConfigError;
pub use error::{AtelierError, AtelierErrorKind, AtelierResult};
pub use failure::FailureKind;
pub use generation::{GenerationError, GenerationErrorKind};
pub use graph::{GraphError, GraphErrorKind};
