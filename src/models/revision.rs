use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::artifact::{Adjustments, Image};
use super::project::ProjectSnapshot;

/// A restorable point in a project's edit trail.
///
/// Each revision holds a complete [`ProjectSnapshot`], so any revision can
/// be restored on its own without replaying earlier ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub id: Uuid,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: RevisionType,
    pub snapshot: ProjectSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<RevisionPayload>,
}

impl Revision {
    pub fn new(label: impl Into<String>, kind: RevisionType, snapshot: ProjectSnapshot) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            timestamp: Utc::now(),
            kind,
            snapshot,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: RevisionPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether the payload, if any, has the shape `kind` expects.
    pub fn payload_matches_type(&self) -> bool {
        match &self.payload {
            Some(payload) => self.kind.accepts(payload),
            None => true,
        }
    }
}

/// The closed set of edit kinds a revision can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevisionType {
    SetPrimaryImage,
    UploadReference,
    ImageGeneration,
    SketchGeneration,
    AreaEditGeneration,
    AdjustmentsChange,
    FilterApply,
    InitialSnapshot,
}

impl RevisionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SetPrimaryImage => "set_primary_image",
            Self::UploadReference => "upload_reference",
            Self::ImageGeneration => "image_generation",
            Self::SketchGeneration => "sketch_generation",
            Self::AreaEditGeneration => "area_edit_generation",
            Self::AdjustmentsChange => "adjustments_change",
            Self::FilterApply => "filter_apply",
            Self::InitialSnapshot => "initial_snapshot",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "set_primary_image" => Some(Self::SetPrimaryImage),
            "upload_reference" => Some(Self::UploadReference),
            "image_generation" => Some(Self::ImageGeneration),
            "sketch_generation" => Some(Self::SketchGeneration),
            "area_edit_generation" => Some(Self::AreaEditGeneration),
            "adjustments_change" => Some(Self::AdjustmentsChange),
            "filter_apply" => Some(Self::FilterApply),
            "initial_snapshot" => Some(Self::InitialSnapshot),
            _ => None,
        }
    }

    /// Whether `payload` is the shape recorded for this kind of edit.
    ///
    /// Initial snapshots carry no payload at all.
    pub fn accepts(&self, payload: &RevisionPayload) -> bool {
        matches!(
            (self, payload),
            (Self::SetPrimaryImage, RevisionPayload::Image { .. })
                | (Self::UploadReference, RevisionPayload::Reference { .. })
                | (
                    Self::ImageGeneration | Self::SketchGeneration | Self::AreaEditGeneration,
                    RevisionPayload::Generation { .. }
                )
                | (Self::AdjustmentsChange, RevisionPayload::Adjustments { .. })
                | (Self::FilterApply, RevisionPayload::Filter { .. })
        )
    }
}

/// Before/after values describing one edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RevisionPayload {
    Image {
        previous: Option<Image>,
        next: Option<Image>,
    },
    Reference {
        image: Image,
    },
    Generation {
        prompt: Option<String>,
        image: Image,
    },
    Adjustments {
        previous: Option<Adjustments>,
        next: Option<Adjustments>,
    },
    Filter {
        previous: Option<String>,
        next: Option<String>,
    },
}
