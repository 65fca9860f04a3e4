use serde::{Deserialize, Serialize};

use super::artifact::{Adjustments, Image};
use super::project::ProjectSnapshot;

/// Live state of the editing surface.
///
/// Owned by the current editing session and mutated only through history
/// operations. Persisting it always copies; see
/// [`build_snapshot`](crate::snapshot::build_snapshot).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub primary_image: Option<Image>,
    pub generated_image: Option<Image>,
    #[serde(default)]
    pub reference_images: Vec<Image>,
    pub prompt: Option<String>,
    pub adjustments: Option<Adjustments>,
    pub filter: Option<String>,
}

impl SessionState {
    /// Load a stored snapshot into a fresh session.
    pub fn restore(snapshot: &ProjectSnapshot) -> Self {
        Self {
            primary_image: snapshot.primary_image.clone(),
            generated_image: snapshot.generated_image.clone(),
            reference_images: snapshot.reference_images.clone(),
            prompt: snapshot.prompt.clone(),
            adjustments: snapshot.adjustments,
            filter: snapshot.filter.clone(),
        }
    }

    /// Whether the session holds anything worth persisting.
    pub fn has_persistable_state(&self) -> bool {
        self.primary_image.is_some()
            || self.generated_image.is_some()
            || !self.reference_images.is_empty()
            || self.prompt.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}
