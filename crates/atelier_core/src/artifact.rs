//! References to artifacts produced by the backend.

use atelier_error::{BackendError, BackendErrorKind};
use serde::{Deserialize, Serialize};

/// Kind of generated artifact.
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
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    /// Still image
    #[display("image")]
    Image,
    /// Video or animation
    #[display("video")]
    Video,
}

/// Enough information to fetch an artifact from the backend; never the bytes themselves.
///
/// # Examples
///
/// ```
/// use atelier_core::{ArtifactKind, ArtifactRef};
///
/// let artifact = ArtifactRef::new(ArtifactKind::Image, "shot_00001_.png", "", "output");
/// let url = artifact.view_url("http://127.0.0.1:8188").unwrap();
/// assert_eq!(url, "http://127.0.0.1:8188/view?filename=shot_00001_.png&subfolder=&type=output");
/// ```
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_getters::Getters,
)]
pub struct ArtifactRef {
    /// Image or video
    kind: ArtifactKind,
    /// Backend-side filename
    filename: String,
    /// Backend-side subfolder (may be empty)
    subfolder: String,
    /// Backend storage bucket (`output`, `temp`, `input`)
    storage_type: String,
}

impl ArtifactRef {
    /// Create a reference.
    pub fn new(
        kind: ArtifactKind,
        filename: impl Into<String>,
        subfolder: impl Into<String>,
        storage_type: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            filename: filename.into(),
            subfolder: subfolder.into(),
            storage_type: storage_type.into(),
        }
    }

    /// Retrieval URL on the backend's `/view` endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL.
    pub fn view_url(&self, base_url: &str) -> Result<String, BackendError> {
        let mut url = url::Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| BackendError::new(BackendErrorKind::InvalidUrl(e.to_string())))?;
        url.path_segments_mut()
            .map_err(|_| {
                BackendError::new(BackendErrorKind::InvalidUrl(format!(
                    "{} cannot be a base",
                    base_url
                )))
            })?
            .pop_if_empty()
            .push("view");
        url.query_pairs_mut()
            .append_pair("filename", &self.filename)
            .append_pair("subfolder", &self.subfolder)
            .append_pair("type", &self.storage_type);
        Ok(url.to_string())
    }
}
