//! Pushes pending local projects to the remote backend.
//!
//! Per project the state machine is `pending -> synced` on success and
//! `pending -> pending` on failure or when the project was edited while the
//! sync ran. At most one sync per project runs at a time. Remote failures are caught here, logged,
//! and recorded as `sync_failure` events; they never propagate to callers.
//! Only store errors (a missing project, a relink conflict) are returned.

mod timer;

pub use timer::DelayedSync;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tokio::task::JoinSet;

use crate::db::{Database, StoreError, StoreResult};
use crate::models::*;
use crate::remote::{
    ArtifactUpload, CreateRemoteProject, RemoteBackend, RemoteProject, UpdateRemoteProject,
};

/// Result of one sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to do: linked, synced, and every artifact already uploaded.
    AlreadySynced { remote_id: String },
    /// Linked and marked synced. Failed uploads stay inline for the next pass.
    Synced {
        remote_id: String,
        uploaded: usize,
        failed_uploads: usize,
    },
    /// Pushed and linked, but the project was edited meanwhile and stays
    /// pending so the next pass pushes the edit.
    Outdated {
        remote_id: String,
        uploaded: usize,
        failed_uploads: usize,
    },
    /// Remote project creation failed; the project stays pending.
    Failed { error: String },
}

impl SyncOutcome {
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            Self::AlreadySynced { remote_id }
            | Self::Synced { remote_id, .. }
            | Self::Outdated { remote_id, .. } => Some(remote_id),
            Self::Failed { .. } => None,
        }
    }
}

pub struct SyncReconciler<R> {
    db: Database,
    remote: Arc<R>,
    owner_id: RwLock<Option<String>>,
    remote_view: RwLock<Vec<RemoteProject>>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<R: RemoteBackend> SyncReconciler<R> {
    pub fn new(db: Database, remote: Arc<R>) -> Self {
        Self {
            db,
            remote,
            owner_id: RwLock::new(None),
            remote_view: RwLock::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_owner(self, owner_id: Option<String>) -> Self {
        self.set_owner(owner_id);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Set the signed-in identity whose bucket uploads go to.
    pub fn set_owner(&self, owner_id: Option<String>) {
        *self.owner_id.write().expect("owner lock poisoned") = owner_id;
    }

    pub fn owner(&self) -> Option<String> {
        self.owner_id.read().expect("owner lock poisoned").clone()
    }

    /// Remote projects as of the last successful refresh.
    pub fn remote_projects(&self) -> Vec<RemoteProject> {
        self.remote_view.read().expect("remote view lock poisoned").clone()
    }

    /// Sync every project that is not yet synced, one after another.
    ///
    /// A store error on one project is logged and the pass moves on.
    pub async fn sync_pending(&self) -> StoreResult<Vec<(String, SyncOutcome)>> {
        let pending = self.db.pending()?;
        tracing::info!("Syncing {} pending local project(s)", pending.len());

        let mut outcomes = Vec::with_capacity(pending.len());
        for project in pending {
            match self.sync_project(&project.id).await {
                Ok(outcome) => outcomes.push((project.id, outcome)),
                Err(e) => tracing::error!("Sync of local project {} aborted: {}", project.id, e),
            }
        }
        Ok(outcomes)
    }

    /// Push one local project to the remote backend.
    ///
    /// A second call for the same project waits for the first to finish and
    /// then starts from the stored state, so it never creates a second
    /// remote project.
    pub async fn sync_project(&self, id: &str) -> StoreResult<SyncOutcome> {
        let lock = self
            .in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .entry(id.to_string())
            .or_default()
            .clone();

        let outcome = {
            let _guard = lock.lock().await;
            self.sync_exclusive(id).await
        };

        let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
        // Only the map and this call still hold it: nobody is waiting.
        if Arc::strong_count(&lock) == 2 {
            in_flight.remove(id);
        }
        outcome
    }

    async fn sync_exclusive(&self, id: &str) -> StoreResult<SyncOutcome> {
        let project = self
            .db
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let inline = project.snapshot.inline_artifacts();

        if let (SyncStatus::Synced, Some(remote_id)) = (project.status, &project.remote_id) {
            if inline.is_empty() {
                tracing::debug!("Local project {} already synced to {}", id, remote_id);
                return Ok(SyncOutcome::AlreadySynced {
                    remote_id: remote_id.clone(),
                });
            }
        }

        self.db.append_event(id, Event::new(EventAction::SyncStart))?;

        let remote_id = match project.remote_id.clone() {
            Some(remote_id) => remote_id,
            None => {
                let request = CreateRemoteProject {
                    name: Some(project.name.clone()),
                };
                match self.remote.create_project(&request).await {
                    Ok(remote) => {
                        // Linked before uploads; the project stays pending until marked synced.
                        self.db.link_remote(id, &remote.id)?;
                        self.db.append_event(
                            id,
                            Event::new(EventAction::Linked {
                                remote_id: remote.id.clone(),
                            }),
                        )?;
                        remote.id
                    }
                    Err(e) => {
                        tracing::warn!("Creating remote project for {} failed: {}", id, e);
                        let error = e.to_string();
                        self.db.append_event(
                            id,
                            Event::new(EventAction::SyncFailure {
                                error: error.clone(),
                                artifact: None,
                            }),
                        )?;
                        return Ok(SyncOutcome::Failed { error });
                    }
                }
            }
        };

        let mut pushed = project.snapshot.clone();
        let (uploaded, failed_uploads) = self
            .upload_artifacts(id, &remote_id, inline, &mut pushed)
            .await?;

        self.push_project_details(id, &remote_id).await?;

        let stored = self
            .db
            .mark_synced_if_unchanged(id, &remote_id, &project.name, &pushed)?;
        if stored.status != SyncStatus::Synced {
            tracing::info!(
                "Local project {} changed while syncing to {}; leaving it pending",
                id,
                remote_id
            );
            return Ok(SyncOutcome::Outdated {
                remote_id,
                uploaded,
                failed_uploads,
            });
        }
        self.db.append_event(
            id,
            Event::new(EventAction::SyncSuccess {
                remote_id: remote_id.clone(),
            }),
        )?;
        tracing::info!(
            "Synced local project {} to {} ({} uploaded, {} failed)",
            id,
            remote_id,
            uploaded,
            failed_uploads
        );

        self.refresh_remote_view().await;

        Ok(SyncOutcome::Synced {
            remote_id,
            uploaded,
            failed_uploads,
        })
    }

    /// Upload inline artifacts concurrently, swapping each success into the
    /// project and into `pushed`. Returns `(uploaded, failed)`.
    async fn upload_artifacts(
        &self,
        id: &str,
        remote_id: &str,
        inline: Vec<(ArtifactRole, Image)>,
        pushed: &mut ProjectSnapshot,
    ) -> StoreResult<(usize, usize)> {
        if inline.is_empty() {
            return Ok((0, 0));
        }
        let Some(owner_id) = self.owner() else {
            tracing::warn!(
                "No signed-in owner; leaving {} artifact(s) of {} inline",
                inline.len(),
                id
            );
            return Ok((0, 0));
        };

        let mut uploads = JoinSet::new();
        for (role, image) in inline {
            let remote = self.remote.clone();
            let request = ArtifactUpload {
                owner_id: owner_id.clone(),
                project_id: remote_id.to_string(),
                inline_image_data: image.as_str().to_string(),
                role,
            };
            uploads.spawn(async move {
                let result = remote.upload_artifact(&request).await;
                (role, image, result)
            });
        }

        let mut uploaded = 0;
        let mut failed = 0;
        while let Some(joined) = uploads.join_next().await {
            match joined {
                Ok((role, image, Ok(artifact))) => {
                    let stored = Image::new(artifact.public_url);
                    pushed.replace_artifact(role, &image, stored.clone());
                    if self.db.replace_artifact(id, role, &image, stored)? {
                        uploaded += 1;
                    } else {
                        tracing::debug!("{} of {} changed during upload; keeping local copy", role, id);
                    }
                }
                Ok((role, _, Err(e))) => {
                    tracing::warn!("Uploading {} of {} failed: {}", role, id, e);
                    failed += 1;
                    self.db.append_event(
                        id,
                        Event::new(EventAction::SyncFailure {
                            error: e.to_string(),
                            artifact: Some(role.to_string()),
                        }),
                    )?;
                }
                Err(e) => {
                    tracing::warn!("Upload task for {} did not finish: {}", id, e);
                    failed += 1;
                }
            }
        }

        Ok((uploaded, failed))
    }

    /// Best-effort update of the remote row with the stored image URLs.
    async fn push_project_details(&self, id: &str, remote_id: &str) -> StoreResult<()> {
        let project = self
            .db
            .get(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let thumbnail_url = external_url(project.snapshot.thumbnail());

        if thumbnail_url.is_some() && thumbnail_url != project.thumbnail {
            self.db.update(
                id,
                ProjectPatch {
                    thumbnail: thumbnail_url.clone(),
                    ..ProjectPatch::default()
                },
            )?;
        }

        let update = UpdateRemoteProject {
            project_id: remote_id.to_string(),
            data: serde_json::to_value(&project.snapshot).ok(),
            thumbnail_url,
            primary_image_url: external_url(project.snapshot.primary_image.as_ref()),
            generated_image_url: external_url(project.snapshot.generated_image.as_ref()),
        };
        if let Err(e) = self.remote.update_project(&update).await {
            tracing::warn!("Updating remote project {} failed: {}", remote_id, e);
        }
        Ok(())
    }

    async fn refresh_remote_view(&self) {
        match self.remote.list_projects().await {
            Ok(projects) => {
                *self.remote_view.write().expect("remote view lock poisoned") = projects;
            }
            Err(e) => tracing::warn!("Refreshing remote projects failed: {}", e),
        }
    }
}

/// The URL of an image that already lives in remote storage.
fn external_url(image: Option<&Image>) -> Option<String> {
    image
        .filter(|image| !image.is_inline())
        .map(|image| image.as_str().to_string())
}
