#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use studio_sync::db::Database;
use studio_sync::models::*;
use studio_sync::remote::*;
use studio_sync::sync::SyncReconciler;

/// In-process stand-in for the remote project backend.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

#[derive(Debug, Default, Clone)]
pub struct FakeState {
    pub fail_create: bool,
    /// Uploads for these roles fail with a server error.
    pub fail_uploads: Vec<ArtifactRole>,
    /// Simulated latency of remote project creation.
    pub create_delay: Option<Duration>,
    /// Simulated latency of remote project updates.
    pub update_delay: Option<Duration>,
    pub created: Vec<RemoteProject>,
    pub uploads: Vec<ArtifactUpload>,
    pub updates: Vec<UpdateRemoteProject>,
    pub events: Vec<RemoteEvent>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.state.lock().unwrap());
    }

    pub fn state(&self) -> FakeState {
        self.state.lock().unwrap().clone()
    }

    pub fn public_url(owner_id: &str, project_id: &str, key: &str) -> String {
        format!("https://cdn.test/{}/{}/{}.png", owner_id, project_id, key)
    }
}

impl RemoteBackend for FakeRemote {
    async fn create_project(&self, input: &CreateRemoteProject) -> Result<RemoteProject, ClientError> {
        let delay = self.state.lock().unwrap().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_create {
            return Err(ClientError::Server("remote unavailable".to_string()));
        }
        let project = RemoteProject {
            id: format!("proj-{}", state.created.len() + 1),
            name: input.name.clone(),
            thumbnail_url: None,
            updated_at: Some(Utc::now()),
        };
        state.created.push(project.clone());
        Ok(project)
    }

    async fn update_project(&self, input: &UpdateRemoteProject) -> Result<(), ClientError> {
        let delay = self.state.lock().unwrap().update_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        if let Some(project) = state.created.iter_mut().find(|p| p.id == input.project_id) {
            project.thumbnail_url = input.thumbnail_url.clone();
        }
        state.updates.push(input.clone());
        Ok(())
    }

    async fn upload_artifact(&self, input: &ArtifactUpload) -> Result<UploadedArtifact, ClientError> {
        let mut state = self.state.lock().unwrap();
        state.uploads.push(input.clone());
        if state.fail_uploads.contains(&input.role) {
            return Err(ClientError::Server(format!("upload of {} rejected", input.role)));
        }
        Ok(UploadedArtifact {
            public_url: Self::public_url(&input.owner_id, &input.project_id, &input.key()),
        })
    }

    async fn append_event(&self, input: &RemoteEvent) -> Result<(), ClientError> {
        self.state.lock().unwrap().events.push(input.clone());
        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<RemoteProject>, ClientError> {
        Ok(self.state.lock().unwrap().created.clone())
    }
}

pub fn setup_db() -> Database {
    let db = Database::open_memory().expect("Failed to create in-memory database");
    db.migrate().expect("Failed to run migrations");
    db
}

pub fn reconciler(remote: Arc<FakeRemote>, owner_id: Option<&str>) -> Arc<SyncReconciler<FakeRemote>> {
    Arc::new(SyncReconciler::new(setup_db(), remote).with_owner(owner_id.map(str::to_string)))
}

/// An image still held as inline data.
pub fn inline(name: &str) -> Image {
    Image::new(format!("data:image/png;base64,{}", name))
}
