use crate::db::{Database, StoreResult};
use crate::models::*;
use crate::snapshot::ProjectDraft;

/// Which stored projects the live session corresponds to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectLink {
    /// The local project this session is editing, once one exists.
    pub local_id: Option<String>,
    /// The remote project this session belongs to, if any.
    pub remote_id: Option<String>,
}

/// Persist `draft` into the session's local project, creating or adopting
/// one as needed, and return the stored project.
///
/// 1. A project already tracked by the session is updated in place and
///    marked pending, since its content changed.
/// 2. Otherwise a project already linked to the session's remote id is
///    adopted, updated, and marked synced.
/// 3. Otherwise a new project is created, linked to the remote id if the
///    session has one.
///
/// The session never ends up with two local projects for one remote id.
pub fn persist(db: &Database, link: &mut ProjectLink, draft: ProjectDraft) -> StoreResult<LocalProject> {
    if let Some(local_id) = link.local_id.clone() {
        if db.get(&local_id)?.is_some() {
            let mut patch = draft.into_patch();
            patch.status = Some(SyncStatus::Pending);
            let project = db.update(&local_id, patch)?;
            if link.remote_id.is_none() {
                link.remote_id = project.remote_id.clone();
            }
            return Ok(project);
        }
        tracing::warn!("Tracked local project {} is gone; relinking", local_id);
        link.local_id = None;
    }

    if let Some(remote_id) = link.remote_id.clone() {
        if let Some(existing) = db.find_by_remote_id(&remote_id)? {
            let mut patch = draft.into_patch();
            patch.status = Some(SyncStatus::Synced);
            let project = db.update(&existing.id, patch)?;
            tracing::debug!(
                "Adopted local project {} for remote project {}",
                project.id,
                remote_id
            );
            link.local_id = Some(project.id.clone());
            return Ok(project);
        }
    }

    let project = db.save(draft.into_new_project(new_local_id(), link.remote_id.clone()))?;
    db.append_event(&project.id, Event::new(EventAction::Created))?;
    if let Some(remote_id) = &link.remote_id {
        db.append_event(
            &project.id,
            Event::new(EventAction::Linked {
                remote_id: remote_id.clone(),
            }),
        )?;
    }
    tracing::info!("Created local project {}", project.id);

    link.local_id = Some(project.id.clone());
    Ok(project)
}
