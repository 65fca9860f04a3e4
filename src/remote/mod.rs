//! The remote project backend, seen from the sync engine.
//!
//! [`RemoteBackend`] is the seam between the reconciler and the network:
//! [`RemoteClient`] talks HTTP, tests substitute an in-process fake.

mod client;

pub use client::{ClientError, RemoteClient, DEFAULT_URL};

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ArtifactRole, Image};

/// Request to create a remote project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRemoteProject {
    pub name: Option<String>,
}

/// A project row on the remote backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request to update a remote project after its artifacts were uploaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRemoteProject {
    pub project_id: String,
    pub data: Option<serde_json::Value>,
    pub thumbnail_url: Option<String>,
    pub primary_image_url: Option<String>,
    pub generated_image_url: Option<String>,
}

/// Request to store one inline image in the remote bucket.
///
/// The destination is derived from `owner_id`, `project_id` and [`key`], so
/// repeating an upload overwrites the same object.
///
/// [`key`]: ArtifactUpload::key
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactUpload {
    pub owner_id: String,
    pub project_id: String,
    pub inline_image_data: String,
    pub role: ArtifactRole,
}

impl ArtifactUpload {
    /// Object key within the project's folder.
    pub fn key(&self) -> String {
        self.role.key(&Image::new(self.inline_image_data.as_str()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedArtifact {
    pub public_url: String,
}

/// An activity entry appended to a remote project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEvent {
    pub project_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Operations the sync engine needs from the remote backend.
///
/// Every call may fail with a [`ClientError`]; callers treat those as
/// transient and never let them reach the user.
pub trait RemoteBackend: Send + Sync + 'static {
    fn create_project(
        &self,
        input: &CreateRemoteProject,
    ) -> impl Future<Output = Result<RemoteProject, ClientError>> + Send;

    fn update_project(
        &self,
        input: &UpdateRemoteProject,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    fn upload_artifact(
        &self,
        input: &ArtifactUpload,
    ) -> impl Future<Output = Result<UploadedArtifact, ClientError>> + Send;

    fn append_event(
        &self,
        input: &RemoteEvent,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Projects owned by the signed-in user.
    fn list_projects(&self) -> impl Future<Output = Result<Vec<RemoteProject>, ClientError>> + Send;
}
