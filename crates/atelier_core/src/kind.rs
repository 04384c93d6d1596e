//! Generation kinds and their per-kind policies.

use crate::ArtifactKind;
use serde::{Deserialize, Serialize};

/// What the caller asked to generate.
///
/// # Examples
///
/// ```
/// use atelier_core::{ArtifactKind, GenerationKind, UploadPolicy};
///
/// assert_eq!(GenerationKind::Portrait.artifact_kind(), ArtifactKind::Image);
/// assert_eq!(GenerationKind::TransitionVideo.upload_policy(), UploadPolicy::Required);
/// assert_eq!(GenerationKind::ShotImage.to_string(), "shot_image");
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
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GenerationKind {
    /// Character portrait image
    Portrait,
    /// Scene establishing image
    SceneImage,
    /// Storyboard shot image
    ShotImage,
    /// Video for a single storyboard shot
    ShotVideo,
    /// Video bridging two shots (first frame → last frame)
    TransitionVideo,
}

impl GenerationKind {
    /// Kind of artifact the caller expects back.
    pub fn artifact_kind(&self) -> ArtifactKind {
        if self.is_video() {
            ArtifactKind::Video
        } else {
            ArtifactKind::Image
        }
    }

    /// Whether this kind produces video.
    pub fn is_video(&self) -> bool {
        matches!(self, GenerationKind::ShotVideo | GenerationKind::TransitionVideo)
    }

    /// How reference upload failures are treated.
    ///
    /// Video graphs have no meaningful fallback without their frames.
    pub fn upload_policy(&self) -> UploadPolicy {
        if self.is_video() {
            UploadPolicy::Required
        } else {
            UploadPolicy::BestEffort
        }
    }

    /// Output filename prefix used when the request does not supply one.
    pub fn default_prefix(&self) -> &'static str {
        match self {
            GenerationKind::Portrait => "portrait",
            GenerationKind::SceneImage => "scene",
            GenerationKind::ShotImage => "shot",
            GenerationKind::ShotVideo => "shot_video",
            GenerationKind::TransitionVideo => "transition",
        }
    }
}

/// Reference-image upload failure handling.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UploadPolicy {
    /// Log the failure and bind without that reference
    BestEffort,
    /// Abort the whole generation
    Required,
}
