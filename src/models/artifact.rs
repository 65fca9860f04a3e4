use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An image held by a project or session.
///
/// Images are either inline (`data:` URIs produced by uploads and
/// generations) or external URLs returned by the remote storage bucket.
/// Only inline images need uploading during sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Image(String);

impl Image {
    pub fn new(src: impl Into<String>) -> Self {
        Self(src.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the image is still embedded data rather than a stored URL.
    pub fn is_inline(&self) -> bool {
        self.0.starts_with("data:")
    }

    /// A name-based id derived from the image data. Equal images share it.
    pub fn content_key(&self) -> Uuid {
        Uuid::new_v5(&Uuid::NAMESPACE_URL, self.0.as_bytes())
    }
}

impl From<&str> for Image {
    fn from(src: &str) -> Self {
        Self::new(src)
    }
}

impl From<String> for Image {
    fn from(src: String) -> Self {
        Self(src)
    }
}

/// Slider settings applied on top of the working image.
///
/// Each value is an offset in `-100..=100`, zero meaning untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Adjustments {
    #[serde(default)]
    pub brightness: i32,
    #[serde(default)]
    pub contrast: i32,
    #[serde(default)]
    pub saturation: i32,
    #[serde(default)]
    pub exposure: i32,
    #[serde(default)]
    pub warmth: i32,
    #[serde(default)]
    pub sharpness: i32,
}

/// The slot an artifact occupies within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "index")]
pub enum ArtifactRole {
    Primary,
    Generated,
    Reference(usize),
}

impl ArtifactRole {
    /// Destination key for uploading `image` into this slot.
    ///
    /// Uploading the same artifact twice yields the same key. Reference
    /// images are keyed by content, not position, so removing one never
    /// hands its key to a different image.
    pub fn key(&self, image: &Image) -> String {
        match self {
            Self::Primary => "primary".to_string(),
            Self::Generated => "generated".to_string(),
            Self::Reference(_) => format!("reference-{}", image.content_key()),
        }
    }
}

impl fmt::Display for ArtifactRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary image"),
            Self::Generated => write!(f, "generated image"),
            Self::Reference(index) => write!(f, "reference image #{}", index + 1),
        }
    }
}
