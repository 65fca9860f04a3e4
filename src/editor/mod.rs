//! The live editing session.
//!
//! [`Editor`] owns the session state and its undo/redo history. Every user
//! action runs synchronously: build an operation, apply it, push it. Actions
//! that produce persistable state then write the session into its local
//! project (see [`link::persist`]) and append a revision. Remote
//! notifications go through the background [`TaskQueue`] and can never undo
//! or block an edit.

pub mod link;

pub use link::ProjectLink;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::db::{Database, StoreError, StoreResult};
use crate::history::{Category, HistoryOperation, HistoryStack};
use crate::models::*;
use crate::remote::{RemoteBackend, RemoteEvent};
use crate::snapshot::{self, ProjectDraft};
use crate::sync::{DelayedSync, SyncOutcome, SyncReconciler};
use crate::tasks::TaskQueue;

/// Delay between signing in and the automatic sync of pending projects.
pub const DEFAULT_SYNC_DELAY: Duration = Duration::from_secs(60);

/// The generative pipelines whose results land in the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Image,
    Sketch,
    AreaEdit,
}

impl GenerationKind {
    fn category(&self) -> Category {
        match self {
            Self::Image => Category::of(["ai", "generation"]),
            Self::Sketch => Category::of(["ai", "sketch"]),
            Self::AreaEdit => Category::of(["ai", "area_edit"]),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Image => "Generate image",
            Self::Sketch => "Generate from sketch",
            Self::AreaEdit => "Edit area",
        }
    }

    fn event_type(&self) -> &'static str {
        match self {
            Self::Image => "image_generation",
            Self::Sketch => "sketch_generation",
            Self::AreaEdit => "area_edit_generation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Persist {
    /// Create or adopt a local project if the session has none yet.
    Create,
    /// Only write if the session already tracks a local project.
    IfTracked,
}

pub struct Editor<R: RemoteBackend> {
    db: Database,
    reconciler: Arc<SyncReconciler<R>>,
    tasks: TaskQueue,
    session: SessionState,
    history: HistoryStack,
    link: ProjectLink,
    name: String,
    /// Operations already written to the local project as revisions.
    recorded: HashSet<Uuid>,
    sync_delay: Duration,
    delayed_sync: Option<DelayedSync>,
}

impl<R: RemoteBackend> Editor<R> {
    pub fn new(reconciler: Arc<SyncReconciler<R>>, tasks: TaskQueue) -> Self {
        Self {
            db: reconciler.database().clone(),
            reconciler,
            tasks,
            session: SessionState::default(),
            history: HistoryStack::new(),
            link: ProjectLink::default(),
            name: DEFAULT_PROJECT_NAME.to_string(),
            recorded: HashSet::new(),
            sync_delay: DEFAULT_SYNC_DELAY,
            delayed_sync: None,
        }
    }

    pub fn with_sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn history(&self) -> &HistoryStack {
        &self.history
    }

    pub fn link(&self) -> &ProjectLink {
        &self.link
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn is_undo_available(&self) -> bool {
        self.history.is_undo_available()
    }

    pub fn is_redo_available(&self) -> bool {
        self.history.is_redo_available()
    }

    // ============================================================
    // Session lifecycle
    // ============================================================

    /// Load a stored local project into the session, discarding the current history.
    pub fn open_project(&mut self, id: &str) -> StoreResult<()> {
        let project = self
            .db
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        self.session = SessionState::restore(&project.snapshot);
        self.name = project.name;
        self.link = ProjectLink {
            local_id: Some(project.id),
            remote_id: project.remote_id,
        };
        self.history.clear();
        self.recorded.clear();
        Ok(())
    }

    /// Associate the session with a remote project, e.g. one opened from the
    /// remote gallery. The local project is resolved on the next write.
    pub fn attach_remote(&mut self, remote_id: impl Into<String>) {
        self.link.remote_id = Some(remote_id.into());
    }

    /// Record the signed-in identity and, once per session, schedule the
    /// delayed sync of pending projects.
    pub fn sign_in(&mut self, owner_id: impl Into<String>) {
        self.reconciler.set_owner(Some(owner_id.into()));
        if self.delayed_sync.is_none() {
            self.delayed_sync = Some(DelayedSync::schedule(
                self.reconciler.clone(),
                self.sync_delay,
            ));
        }
    }

    /// Cancel the delayed sync if it has not fired yet.
    pub fn end(&mut self) {
        if let Some(mut timer) = self.delayed_sync.take() {
            timer.cancel();
        }
    }

    /// Wait for queued remote notifications to finish.
    pub async fn flush(&self) {
        self.tasks.flush().await;
    }

    // ============================================================
    // Edits
    // ============================================================

    pub fn set_primary_image(&mut self, image: Image) {
        let previous = self.session.primary_image.clone();
        let next = Some(image);
        let op = HistoryOperation::set(
            "Set primary image",
            Category::of(["images"]),
            |s| &mut s.primary_image,
            previous.clone(),
            next.clone(),
        )
        .with_metadata(RevisionPayload::Image { previous, next });
        self.perform(op, Persist::Create, "set_primary_image");
    }

    pub fn add_reference_image(&mut self, image: Image) {
        let previous = self.session.reference_images.clone();
        let mut next = previous.clone();
        next.push(image.clone());
        let op = HistoryOperation::set(
            "Add reference image",
            Category::of(["images", "references"]),
            |s| &mut s.reference_images,
            previous,
            next,
        )
        .with_metadata(RevisionPayload::Reference { image });
        self.perform(op, Persist::Create, "add_reference_image");
    }

    /// Returns false if there is no reference image at `index`.
    pub fn remove_reference_image(&mut self, index: usize) -> bool {
        if index >= self.session.reference_images.len() {
            return false;
        }
        let previous = self.session.reference_images.clone();
        let mut next = previous.clone();
        next.remove(index);
        let op = HistoryOperation::set(
            "Remove reference image",
            Category::of(["reference_removal"]),
            |s| &mut s.reference_images,
            previous,
            next,
        );
        self.perform(op, Persist::IfTracked, "remove_reference_image");
        true
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        let next = (!prompt.trim().is_empty()).then_some(prompt);
        let op = HistoryOperation::set(
            "Edit prompt",
            Category::of(["prompt"]),
            |s| &mut s.prompt,
            self.session.prompt.clone(),
            next,
        );
        self.perform(op, Persist::Create, "set_prompt");
    }

    /// Put a generation result into the session, along with the prompt that produced it.
    pub fn apply_generation(&mut self, kind: GenerationKind, image: Image, prompt: Option<String>) {
        let previous_image = self.session.generated_image.clone();
        let previous_prompt = self.session.prompt.clone();
        let next_prompt = prompt.clone().or_else(|| previous_prompt.clone());
        let next_image = image.clone();

        let op = HistoryOperation::new(kind.label(), kind.category())
            .on_apply(move |s| {
                s.generated_image = Some(next_image.clone());
                s.prompt = next_prompt.clone();
            })
            .on_undo(move |s| {
                s.generated_image = previous_image.clone();
                s.prompt = previous_prompt.clone();
            })
            .with_metadata(RevisionPayload::Generation { prompt, image });
        self.perform(op, Persist::Create, kind.event_type());
    }

    pub fn set_adjustments(&mut self, adjustments: Adjustments) {
        let previous = self.session.adjustments;
        let next = Some(adjustments);
        let op = HistoryOperation::set(
            "Adjust image",
            Category::of(["adjustments"]),
            |s| &mut s.adjustments,
            previous,
            next,
        )
        .with_metadata(RevisionPayload::Adjustments { previous, next });
        self.perform(op, Persist::IfTracked, "set_adjustments");
    }

    pub fn apply_filter(&mut self, filter: Option<String>) {
        let previous = self.session.filter.clone();
        let op = HistoryOperation::set(
            "Apply filter",
            Category::of(["filters"]),
            |s| &mut s.filter,
            previous.clone(),
            filter.clone(),
        )
        .with_metadata(RevisionPayload::Filter {
            previous,
            next: filter,
        });
        self.perform(op, Persist::IfTracked, "apply_filter");
    }

    /// Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(label) = self
            .history
            .undo(&mut self.session)
            .map(|op| op.label.clone())
        else {
            return false;
        };
        self.after_history_move("undo", &label);
        true
    }

    /// Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(label) = self
            .history
            .redo(&mut self.session)
            .map(|op| op.label.clone())
        else {
            return false;
        };
        self.after_history_move("redo", &label);
        true
    }

    // ============================================================
    // Persistence
    // ============================================================

    /// Write the session into its local project now.
    ///
    /// Returns `None` when the session has nothing to persist yet.
    pub fn save(&mut self) -> StoreResult<Option<LocalProject>> {
        if !self.has_anything_to_save() {
            return Ok(None);
        }
        let draft = self.draft();
        let project = link::persist(&self.db, &mut self.link, draft)?;
        Ok(Some(project))
    }

    /// Best-effort save while leaving the editor. Failures are logged.
    pub fn save_on_exit(&mut self) -> Option<LocalProject> {
        if !self.has_anything_to_save() {
            return None;
        }
        match self.checkpoint(EventAction::SaveOnExit) {
            Ok(project) => Some(project),
            Err(e) => {
                tracing::warn!("Saving session on exit failed: {}", e);
                None
            }
        }
    }

    /// Leave the editor: save, then end the session.
    pub fn exit(mut self) -> Option<LocalProject> {
        let saved = self.save_on_exit();
        self.end();
        saved
    }

    /// Capture the current project, including every edit not yet recorded,
    /// then reset to an empty session. Returns the saved project, if any.
    pub fn start_new_project(&mut self) -> Option<LocalProject> {
        let saved = if self.has_anything_to_save() {
            match self.checkpoint(EventAction::NewProject) {
                Ok(project) => Some(project),
                Err(e) => {
                    tracing::warn!("Saving session before new project failed: {}", e);
                    None
                }
            }
        } else {
            None
        };

        self.history.clear();
        self.recorded.clear();
        self.session = SessionState::default();
        self.link = ProjectLink::default();
        self.name = DEFAULT_PROJECT_NAME.to_string();
        saved
    }

    /// Push the session's local project to the remote backend now.
    ///
    /// Returns `None` if the session has no local project yet.
    pub async fn sync_now(&mut self) -> StoreResult<Option<SyncOutcome>> {
        let Some(local_id) = self.link.local_id.clone() else {
            return Ok(None);
        };
        let outcome = self.reconciler.sync_project(&local_id).await?;
        if let Some(remote_id) = outcome.remote_id() {
            self.link.remote_id = Some(remote_id.to_string());
        }
        Ok(Some(outcome))
    }

    fn has_anything_to_save(&self) -> bool {
        self.session.has_persistable_state() || self.link.local_id.is_some()
    }

    fn draft(&self) -> ProjectDraft {
        snapshot::build_draft(&self.session, &self.name)
    }

    fn perform(&mut self, op: HistoryOperation, persist: Persist, event_type: &str) {
        op.apply(&mut self.session);
        let revision = snapshot::revision_for(&op, snapshot::build_snapshot(&self.session));
        let label = op.label.clone();
        if !self.history.push(op) {
            return;
        }

        let write = match persist {
            Persist::Create => self.has_anything_to_save(),
            Persist::IfTracked => self.link.local_id.is_some(),
        };
        if write {
            if let Err(e) = self.record(revision) {
                tracing::warn!("Recording '{}' in the local project failed: {}", label, e);
            }
        }

        self.notify_remote(event_type, &label);
    }

    fn record(&mut self, revision: Revision) -> StoreResult<()> {
        let draft = self.draft();
        let project = link::persist(&self.db, &mut self.link, draft)?;
        let id = revision.id;
        self.db.append_revision(&project.id, revision)?;
        self.recorded.insert(id);
        Ok(())
    }

    fn after_history_move(&mut self, event_type: &str, label: &str) {
        if self.link.local_id.is_some() {
            let draft = self.draft();
            if let Err(e) = link::persist(&self.db, &mut self.link, draft) {
                tracing::warn!("Saving after {} failed: {}", event_type, e);
            }
        }
        self.notify_remote(event_type, label);
    }

    /// Persist the session, write revisions for every applied edit not yet
    /// recorded, and append `action` as an event.
    fn checkpoint(&mut self, action: EventAction) -> StoreResult<LocalProject> {
        let draft = self.draft();
        let project = link::persist(&self.db, &mut self.link, draft)?;

        for revision in snapshot::replay_history(self.history.past(), &self.session) {
            if self.recorded.contains(&revision.id) {
                continue;
            }
            let id = revision.id;
            self.db.append_revision(&project.id, revision)?;
            self.recorded.insert(id);
        }
        self.db.append_event(&project.id, Event::new(action))?;

        self.db
            .get(&project.id)?
            .ok_or_else(|| StoreError::NotFound(project.id.clone()))
    }

    /// Tell the remote project about an edit, without waiting for it.
    fn notify_remote(&self, event_type: &str, label: &str) {
        let Some(project_id) = self.link.remote_id.clone() else {
            return;
        };
        let remote = self.reconciler.remote().clone();
        let event = RemoteEvent {
            project_id,
            event_type: event_type.to_string(),
            meta: Some(serde_json::json!({ "label": label })),
        };
        self.tasks
            .dispatch(format!("remote event {}", event_type), async move {
                remote.append_event(&event).await
            });
    }
}
