use thiserror::Error;

/// Errors raised by the local project store.
///
/// `NotFound`, `DuplicateId`, `RemoteIdTaken` and `RemoteIdConflict` point
/// at a misbehaving call site rather than a runtime condition.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Local project not found: {0}")]
    NotFound(String),

    #[error("Local project already exists: {0}")]
    DuplicateId(String),

    #[error("Remote project {remote_id} is already linked to local project {local_id}")]
    RemoteIdTaken { remote_id: String, local_id: String },

    #[error("Local project {id} is linked to {existing}, refusing to relink to {requested}")]
    RemoteIdConflict {
        id: String,
        existing: String,
        requested: String,
    },

    #[error("Revision payload does not match revision type {0}")]
    PayloadMismatch(&'static str),

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
