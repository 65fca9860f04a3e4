use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::{Adjustments, ArtifactRole, Image};
use super::event::Event;
use super::revision::Revision;

/// A client-durable snapshot of one editing project.
///
/// Local projects exist independently of the remote backend. Once a project
/// has been pushed, `remote_id` links it to the authoritative remote row and
/// no other local project may hold the same remote id.
///
/// Projects are never deleted. They move between sync states and carry an
/// append-only trail of [`Event`]s and restorable [`Revision`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalProject {
    pub id: String,
    pub remote_id: Option<String>,
    pub name: String,
    pub status: SyncStatus,
    #[serde(flatten)]
    pub snapshot: ProjectSnapshot,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub events: Vec<Event>,
    #[serde(default)]
    pub revisions: Vec<Revision>,
}

/// Whether a local project has reached the remote backend.
///
/// - `Pending`: Local edits not yet pushed (or the last attempt failed)
/// - `Synced`: Linked to a remote project with all known edits pushed
/// - `Failed`: Display state for a failed attempt; still retried
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Pending,
    Synced,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "synced" => Some(Self::Synced),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// The editable state of a project at one instant.
///
/// Snapshots are full, independent copies: a revision or project never
/// shares mutable data with the live session it was taken from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    pub primary_image: Option<Image>,
    pub generated_image: Option<Image>,
    #[serde(default)]
    pub reference_images: Vec<Image>,
    pub prompt: Option<String>,
    pub adjustments: Option<Adjustments>,
    pub filter: Option<String>,
}

impl ProjectSnapshot {
    pub fn is_empty(&self) -> bool {
        self.primary_image.is_none()
            && self.generated_image.is_none()
            && self.reference_images.is_empty()
            && self.prompt.is_none()
    }

    /// Every artifact present, tagged with its role.
    pub fn artifacts(&self) -> Vec<(ArtifactRole, &Image)> {
        let mut artifacts = Vec::new();
        if let Some(image) = &self.primary_image {
            artifacts.push((ArtifactRole::Primary, image));
        }
        if let Some(image) = &self.generated_image {
            artifacts.push((ArtifactRole::Generated, image));
        }
        for (index, image) in self.reference_images.iter().enumerate() {
            artifacts.push((ArtifactRole::Reference(index), image));
        }
        artifacts
    }

    /// Artifacts that are still embedded data and need uploading.
    pub fn inline_artifacts(&self) -> Vec<(ArtifactRole, Image)> {
        self.artifacts()
            .into_iter()
            .filter(|(_, image)| image.is_inline())
            .map(|(role, image)| (role, image.clone()))
            .collect()
    }

    /// Swap the artifact in `role` for `replacement`, but only while the slot
    /// still holds `expected`. Returns whether the swap happened.
    pub fn replace_artifact(
        &mut self,
        role: ArtifactRole,
        expected: &Image,
        replacement: Image,
    ) -> bool {
        let slot = match role {
            ArtifactRole::Primary => self.primary_image.as_mut(),
            ArtifactRole::Generated => self.generated_image.as_mut(),
            ArtifactRole::Reference(index) => self.reference_images.get_mut(index),
        };
        match slot {
            Some(current) if current == expected => {
                *current = replacement;
                true
            }
            _ => false,
        }
    }

    /// The image shown in galleries: the latest generation, else the upload.
    pub fn thumbnail(&self) -> Option<&Image> {
        self.generated_image.as_ref().or(self.primary_image.as_ref())
    }
}

/// Input for creating a local project.
///
/// The id is chosen by the client (see [`new_local_id`]) and must be unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLocalProject {
    pub id: String,
    pub name: String,
    /// Remote project to link at creation time, if the session already has one.
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Defaults to `Pending`, or `Synced` when `remote_id` is set.
    #[serde(default)]
    pub status: Option<SyncStatus>,
    #[serde(flatten)]
    pub snapshot: ProjectSnapshot,
    #[serde(default)]
    pub thumbnail: Option<String>,
}

impl NewLocalProject {
    pub fn untitled(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: DEFAULT_PROJECT_NAME.to_string(),
            remote_id: None,
            status: None,
            snapshot: ProjectSnapshot::default(),
            thumbnail: None,
        }
    }
}

/// Input for updating a local project. All fields are optional for partial updates.
///
/// `snapshot` replaces every snapshot field at once (including clearing
/// fields that are `None` in it); the individual fields are merged after it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub status: Option<SyncStatus>,
    pub snapshot: Option<ProjectSnapshot>,
    pub primary_image: Option<Image>,
    pub generated_image: Option<Image>,
    pub reference_images: Option<Vec<Image>>,
    pub prompt: Option<String>,
    pub adjustments: Option<Adjustments>,
    pub filter: Option<String>,
    pub thumbnail: Option<String>,
}

impl ProjectPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.status.is_none()
            && self.snapshot.is_none()
            && self.primary_image.is_none()
            && self.generated_image.is_none()
            && self.reference_images.is_none()
            && self.prompt.is_none()
            && self.adjustments.is_none()
            && self.filter.is_none()
            && self.thumbnail.is_none()
    }

    /// Apply the patch to a project's mutable fields.
    pub fn merge_into(self, project: &mut LocalProject) {
        if let Some(snapshot) = self.snapshot {
            project.snapshot = snapshot;
        }
        let target = &mut project.snapshot;
        if let Some(image) = self.primary_image {
            target.primary_image = Some(image);
        }
        if let Some(image) = self.generated_image {
            target.generated_image = Some(image);
        }
        if let Some(images) = self.reference_images {
            target.reference_images = images;
        }
        if let Some(prompt) = self.prompt {
            target.prompt = Some(prompt);
        }
        if let Some(adjustments) = self.adjustments {
            target.adjustments = Some(adjustments);
        }
        if let Some(filter) = self.filter {
            target.filter = Some(filter);
        }
        if let Some(name) = self.name {
            project.name = name;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        if let Some(thumbnail) = self.thumbnail {
            project.thumbnail = Some(thumbnail);
        }
    }
}

/// Name given to projects the user has not named yet.
pub const DEFAULT_PROJECT_NAME: &str = "Untitled";

/// Generate a fresh client-side project id.
pub fn new_local_id() -> String {
    format!("local-{}", Uuid::new_v4())
}
