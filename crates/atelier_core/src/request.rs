//! Generation requests.

use crate::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// A local reference image destined for a loader node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceImage {
    /// Loader role the image fills
    pub role: Role,
    /// Local file path
    pub path: PathBuf,
}

impl ReferenceImage {
    /// Create a reference image entry.
    pub fn new(role: Role, path: impl Into<PathBuf>) -> Self {
        Self {
            role,
            path: path.into(),
        }
    }
}

/// Width:height ratio such as `16:9`.
///
/// # Examples
///
/// ```
/// use atelier_core::AspectRatio;
///
/// let ratio: AspectRatio = "16:9".parse().unwrap();
/// assert_eq!(ratio.dimensions(1024), (1024, 576));
///
/// let portrait: AspectRatio = "2x3".parse().unwrap();
/// assert_eq!(portrait.dimensions(1024), (680, 1024));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(try_from = "String", into = "String")]
#[display("{}:{}", width, height)]
pub struct AspectRatio {
    /// Width term
    pub width: u32,
    /// Height term
    pub height: u32,
}

impl AspectRatio {
    /// Pixel dimensions with the long side fixed to `long_side`, rounded down to a
    /// multiple of 8.
    pub fn dimensions(&self, long_side: u32) -> (u32, u32) {
        let round = |v: u64| ((v / 8) * 8).max(8) as u32;
        let long = u64::from(long_side);
        if self.width >= self.height {
            let short = long * u64::from(self.height) / u64::from(self.width);
            (round(long), round(short))
        } else {
            let short = long * u64::from(self.width) / u64::from(self.height);
            (round(short), round(long))
        }
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().splitn(2, [':', 'x', 'X', '/']);
        let parse = |part: Option<&str>| {
            part.map(str::trim)
                .and_then(|p| p.parse::<u32>().ok())
                .filter(|v| *v > 0)
        };
        match (parse(parts.next()), parse(parts.next())) {
            (Some(width), Some(height)) => Ok(Self { width, height }),
            _ => Err(format!("Invalid aspect ratio: {}", s)),
        }
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(ratio: AspectRatio) -> Self {
        ratio.to_string()
    }
}

/// Immutable input to one binding operation.
///
/// # Examples
///
/// ```
/// use atelier_core::{GenerationRequest, ReferenceImage, Role};
///
/// let request = GenerationRequest::builder()
///     .prompt("a knight in silver armor, portrait")
///     .width(832)
///     .height(1216)
///     .references(vec![ReferenceImage::new(Role::CharacterReferenceImage, "knight.png")])
///     .build()
///     .unwrap();
///
/// assert_eq!(request.prompt(), "a knight in silver armor, portrait");
/// assert_eq!(request.dimensions(1024), (Some(832), Some(1216)));
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Default,
    Serialize,
    Deserialize,
    derive_builder::Builder,
    derive_getters::Getters,
)]
#[builder(default)]
pub struct GenerationRequest {
    /// Positive prompt text
    #[builder(setter(into))]
    prompt: String,
    /// Reference images, in the order they should fill unmapped loaders
    #[serde(default)]
    references: Vec<ReferenceImage>,
    /// Output width
    #[serde(default)]
    #[builder(setter(strip_option))]
    width: Option<u32>,
    /// Output height
    #[serde(default)]
    #[builder(setter(strip_option))]
    height: Option<u32>,
    /// Video frame count
    #[serde(default)]
    #[builder(setter(strip_option))]
    frame_count: Option<u32>,
    /// Longest-side constraint
    #[serde(default)]
    #[builder(setter(strip_option))]
    max_side: Option<u32>,
    /// Ratio used to derive missing dimensions
    #[serde(default)]
    #[builder(setter(strip_option))]
    aspect_ratio: Option<AspectRatio>,
    /// Output filename prefix
    #[serde(default)]
    #[builder(setter(into, strip_option))]
    filename_prefix: Option<String>,
}

impl GenerationRequest {
    /// Creates a new builder for `GenerationRequest`.
    pub fn builder() -> GenerationRequestBuilder {
        GenerationRequestBuilder::default()
    }

    /// Effective width and height.
    ///
    /// Explicit values win; missing ones are derived from the aspect ratio with the long
    /// side set to `max_side` (or `default_long_side` when no max side was given).
    pub fn dimensions(&self, default_long_side: u32) -> (Option<u32>, Option<u32>) {
        let derived = self
            .aspect_ratio
            .map(|ratio| ratio.dimensions(self.max_side.unwrap_or(default_long_side)));
        (
            self.width.or(derived.map(|(w, _)| w)),
            self.height.or(derived.map(|(_, h)| h)),
        )
    }

    /// Same request, with `prefix` filled in when no filename prefix was given.
    pub fn with_default_prefix(&self, prefix: &str) -> Self {
        Self {
            filename_prefix: self
                .filename_prefix
                .clone()
                .or_else(|| Some(prefix.to_string())),
            ..self.clone()
        }
    }

    /// Same request with a different reference list.
    pub fn with_references(&self, references: Vec<ReferenceImage>) -> Self {
        Self {
            references,
            ..self.clone()
        }
    }
}
