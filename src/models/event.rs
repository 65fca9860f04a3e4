use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A lightweight audit entry on a local project.
///
/// Events record *what happened* (sync attempts, exits, links). Unlike
/// revisions they carry no state and cannot be restored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub action: EventAction,
}

impl Event {
    pub fn new(action: EventAction) -> Self {
        Self {
            label: action.default_label(),
            timestamp: Utc::now(),
            action,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// What an event records, with the payload each action carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", content = "payload", rename_all = "snake_case")]
pub enum EventAction {
    /// The local project was created.
    Created,
    /// The local project was attached to an existing remote project.
    Linked { remote_id: String },
    /// Session state was saved while leaving the editor.
    SaveOnExit,
    /// Session state was saved before the session started a new project.
    NewProject,
    SyncStart,
    SyncSuccess { remote_id: String },
    /// A sync step failed. `artifact` names the upload that failed, if any.
    SyncFailure {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        artifact: Option<String>,
    },
}

impl EventAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Linked { .. } => "linked",
            Self::SaveOnExit => "save_on_exit",
            Self::NewProject => "new_project",
            Self::SyncStart => "sync_start",
            Self::SyncSuccess { .. } => "sync_success",
            Self::SyncFailure { .. } => "sync_failure",
        }
    }

    fn default_label(&self) -> String {
        match self {
            Self::Created => "Project created".to_string(),
            Self::Linked { remote_id } => format!("Linked to {}", remote_id),
            Self::SaveOnExit => "Saved on exit".to_string(),
            Self::NewProject => "Saved before new project".to_string(),
            Self::SyncStart => "Sync started".to_string(),
            Self::SyncSuccess { remote_id } => format!("Synced to {}", remote_id),
            Self::SyncFailure {
                artifact: Some(artifact),
                ..
            } => format!("Upload failed: {}", artifact),
            Self::SyncFailure { artifact: None, .. } => "Sync failed".to_string(),
        }
    }
}
