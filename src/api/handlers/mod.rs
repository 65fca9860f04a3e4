use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::db::StoreError;
use crate::models::*;
use crate::remote::{RemoteBackend, RemoteProject};
use crate::sync::SyncOutcome;

// ============================================================
// Error Handling
// ============================================================

/// Map a store error to a response.
///
/// Caller mistakes (unknown id, duplicate or conflicting link, payload of the
/// wrong shape) are returned as-is. Anything else is logged and the client
/// sees a generic message.
fn store_error(e: StoreError) -> (StatusCode, String) {
    let status = match &e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::DuplicateId(_)
        | StoreError::RemoteIdTaken { .. }
        | StoreError::RemoteIdConflict { .. } => StatusCode::CONFLICT,
        StoreError::PayloadMismatch(_) => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Sqlite(_) | StoreError::Json(_) => {
            tracing::error!("Internal error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            );
        }
    };
    tracing::warn!("Rejected request: {}", e);
    (status, e.to_string())
}

fn not_found(id: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("Project not found: {}", id))
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Local Projects
// ============================================================

pub async fn list_projects<R: RemoteBackend>(
    State(state): State<AppState<R>>,
) -> Result<Json<Vec<LocalProject>>, (StatusCode, String)> {
    state.db.list().map(Json).map_err(store_error)
}

pub async fn get_project<R: RemoteBackend>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<LocalProject>, (StatusCode, String)> {
    state
        .db
        .get(&id)
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

pub async fn find_by_remote_id<R: RemoteBackend>(
    State(state): State<AppState<R>>,
    Path(remote_id): Path<String>,
) -> Result<Json<LocalProject>, (StatusCode, String)> {
    state
        .db
        .find_by_remote_id(&remote_id)
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("No local project linked to {}", remote_id),
            )
        })
}

pub async fn create_project<R: RemoteBackend>(
    State(state): State<AppState<R>>,
    Json(input): Json<NewLocalProject>,
) -> Result<(StatusCode, Json<LocalProject>), (StatusCode, String)> {
    let project = state.db.save(input).map_err(store_error)?;
    state
        .db
        .append_event(&project.id, Event::new(EventAction::Created))
        .map_err(store_error)?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update_project<R: RemoteBackend>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(patch): Json<ProjectPatch>,
) -> Result<Json<LocalProject>, (StatusCode, String)> {
    state.db.update(&id, patch).map(Json).map_err(store_error)
}

#[derive(Debug, Deserialize)]
pub struct AppendEventInput {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub action: EventAction,
}

pub async fn append_event<R: RemoteBackend>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(input): Json<AppendEventInput>,
) -> Result<StatusCode, (StatusCode, String)> {
    let mut event = Event::new(input.action);
    if let Some(label) = input.label {
        event = event.with_label(label);
    }
    state.db.append_event(&id, event).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn append_revision<R: RemoteBackend>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(revision): Json<Revision>,
) -> Result<StatusCode, (StatusCode, String)> {
    state.db.append_revision(&id, revision).map_err(store_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct MarkSyncedInput {
    pub remote_id: String,
}

pub async fn mark_synced<R: RemoteBackend>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(input): Json<MarkSyncedInput>,
) -> Result<Json<LocalProject>, (StatusCode, String)> {
    state
        .db
        .mark_synced(&id, &input.remote_id)
        .map(Json)
        .map_err(store_error)
}

// ============================================================
// Sync
// ============================================================

#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub id: String,
    pub remote_id: Option<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub uploaded: usize,
    pub failed_uploads: usize,
}

impl SyncReport {
    fn new(id: String, outcome: SyncOutcome) -> Self {
        let remote_id = outcome.remote_id().map(str::to_string);
        match outcome {
            SyncOutcome::AlreadySynced { .. } => Self {
                id,
                remote_id,
                outcome: "already_synced",
                error: None,
                uploaded: 0,
                failed_uploads: 0,
            },
            SyncOutcome::Synced {
                uploaded,
                failed_uploads,
                ..
            } => Self {
                id,
                remote_id,
                outcome: "synced",
                error: None,
                uploaded,
                failed_uploads,
            },
            SyncOutcome::Outdated {
                uploaded,
                failed_uploads,
                ..
            } => Self {
                id,
                remote_id,
                outcome: "outdated",
                error: None,
                uploaded,
                failed_uploads,
            },
            SyncOutcome::Failed { error } => Self {
                id,
                remote_id,
                outcome: "failed",
                error: Some(error),
                uploaded: 0,
                failed_uploads: 0,
            },
        }
    }
}

pub async fn sync_project<R: RemoteBackend>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> Result<Json<SyncReport>, (StatusCode, String)> {
    let outcome = state
        .reconciler
        .sync_project(&id)
        .await
        .map_err(store_error)?;
    Ok(Json(SyncReport::new(id, outcome)))
}

pub async fn sync_pending<R: RemoteBackend>(
    State(state): State<AppState<R>>,
) -> Result<Json<Vec<SyncReport>>, (StatusCode, String)> {
    let outcomes = state.reconciler.sync_pending().await.map_err(store_error)?;
    Ok(Json(
        outcomes
            .into_iter()
            .map(|(id, outcome)| SyncReport::new(id, outcome))
            .collect(),
    ))
}

pub async fn list_remote_projects<R: RemoteBackend>(
    State(state): State<AppState<R>>,
) -> Json<Vec<RemoteProject>> {
    Json(state.reconciler.remote_projects())
}
