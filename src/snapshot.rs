//! Conversions from live session state to stored projects and revisions.
//!
//! Everything here is pure: values are built, nothing is written.

use crate::history::{Category, HistoryOperation};
use crate::models::*;

/// A project shape built from a session, not yet tied to an id or status.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDraft {
    pub name: String,
    pub snapshot: ProjectSnapshot,
    pub thumbnail: Option<String>,
}

impl ProjectDraft {
    pub fn into_new_project(self, id: String, remote_id: Option<String>) -> NewLocalProject {
        NewLocalProject {
            id,
            name: self.name,
            remote_id,
            status: None,
            snapshot: self.snapshot,
            thumbnail: self.thumbnail,
        }
    }

    /// A patch replacing the stored snapshot with this draft's.
    pub fn into_patch(self) -> ProjectPatch {
        ProjectPatch {
            name: Some(self.name),
            snapshot: Some(self.snapshot),
            thumbnail: self.thumbnail,
            ..ProjectPatch::default()
        }
    }
}

/// Copy the session's state into a standalone snapshot.
pub fn build_snapshot(session: &SessionState) -> ProjectSnapshot {
    ProjectSnapshot {
        primary_image: session.primary_image.clone(),
        generated_image: session.generated_image.clone(),
        reference_images: session.reference_images.clone(),
        prompt: session.prompt.clone(),
        adjustments: session.adjustments,
        filter: session.filter.clone(),
    }
}

pub fn build_draft(session: &SessionState, name: &str) -> ProjectDraft {
    let snapshot = build_snapshot(session);
    let thumbnail = snapshot.thumbnail().map(|image| image.as_str().to_string());
    ProjectDraft {
        name: name.to_string(),
        snapshot,
        thumbnail,
    }
}

/// Map an operation's category to the revision type it records as.
///
/// Categories with no known mapping record as `InitialSnapshot`.
pub fn to_revision_type(category: &Category) -> RevisionType {
    if category.contains("ai") || category.contains("generation") {
        if category.contains("area_edit") {
            RevisionType::AreaEditGeneration
        } else if category.contains("sketch") {
            RevisionType::SketchGeneration
        } else {
            RevisionType::ImageGeneration
        }
    } else if category.contains("references") {
        RevisionType::UploadReference
    } else if category.contains("images") {
        RevisionType::SetPrimaryImage
    } else if category.contains("adjustments") {
        RevisionType::AdjustmentsChange
    } else if category.contains("filters") {
        RevisionType::FilterApply
    } else {
        RevisionType::InitialSnapshot
    }
}

/// The revision recording `op`, given the session state right after it applied.
///
/// The revision shares the operation's id so the same edit is never
/// recorded twice. Metadata whose shape does not fit the mapped type is
/// left out rather than stored mislabelled.
pub fn revision_for(op: &HistoryOperation, snapshot: ProjectSnapshot) -> Revision {
    let kind = to_revision_type(&op.category);
    let payload = op
        .metadata
        .clone()
        .filter(|payload| kind.accepts(payload));

    Revision {
        id: op.id,
        label: op.label.clone(),
        timestamp: op.timestamp,
        kind,
        snapshot,
        payload,
    }
}

/// Rebuild one revision per applied operation from the current session.
///
/// Walks back through `past` with each operation's undo on a scratch copy
/// of the session to reach the state before the first edit, then replays
/// forward, snapshotting after every step. The live session is untouched.
pub fn replay_history(past: &[HistoryOperation], current: &SessionState) -> Vec<Revision> {
    let mut scratch = current.clone();
    for op in past.iter().rev() {
        op.revert(&mut scratch);
    }

    past.iter()
        .map(|op| {
            op.apply(&mut scratch);
            revision_for(op, build_snapshot(&scratch))
        })
        .collect()
}
