mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use crate::remote::RemoteBackend;
use crate::sync::SyncReconciler;

/// Shared handler state: the store, and the reconciler that pushes it.
pub struct AppState<R> {
    pub db: Database,
    pub reconciler: Arc<SyncReconciler<R>>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}

pub fn create_router<R: RemoteBackend>(reconciler: Arc<SyncReconciler<R>>) -> Router {
    let state = AppState {
        db: reconciler.database().clone(),
        reconciler,
    };

    let api = Router::new()
        // Local projects
        .route(
            "/projects",
            get(handlers::list_projects::<R>).post(handlers::create_project::<R>),
        )
        .route(
            "/projects/{id}",
            get(handlers::get_project::<R>).put(handlers::update_project::<R>),
        )
        .route("/projects/{id}/events", post(handlers::append_event::<R>))
        .route("/projects/{id}/revisions", post(handlers::append_revision::<R>))
        .route("/projects/{id}/synced", post(handlers::mark_synced::<R>))
        .route("/projects/{id}/sync", post(handlers::sync_project::<R>))
        .route(
            "/projects/by-remote/{remote_id}",
            get(handlers::find_by_remote_id::<R>),
        )
        // Sync
        .route("/sync", post(handlers::sync_pending::<R>))
        .route("/remote-projects", get(handlers::list_remote_projects::<R>))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
