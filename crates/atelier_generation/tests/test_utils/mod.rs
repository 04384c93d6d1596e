//! Test utilities for generation tests.
//!
//! This module provides a scripted in-process backend.

pub mod mock_backend;

#[allow(unused_imports)]
pub use mock_backend::{MockBackend, MockHistory, MockSubmit, MockUpload};
