//! Durable client-local project store.
//!
//! Every public mutation is a single read-modify-write against one project,
//! run inside one SQLite transaction. Events and revisions are kept in child
//! tables and read back in insertion order.

mod error;
mod schema;

pub use error::{StoreError, StoreResult};

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::*;

const PROJECT_COLUMNS: &str = "id, remote_id, name, status, primary_image, generated_image,
     reference_images, prompt, adjustments, filter, thumbnail, created_at, updated_at";

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Queries
    // ============================================================

    /// All local projects with their events and revisions, oldest first.
    pub fn list(&self) -> StoreResult<Vec<LocalProject>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let sql = format!(
            "SELECT {} FROM local_projects ORDER BY created_at, id",
            PROJECT_COLUMNS
        );
        load_projects(&conn, &sql, [])
    }

    /// Projects that still need pushing to the remote backend.
    pub fn pending(&self) -> StoreResult<Vec<LocalProject>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let sql = format!(
            "SELECT {} FROM local_projects WHERE status != 'synced' ORDER BY created_at, id",
            PROJECT_COLUMNS
        );
        load_projects(&conn, &sql, [])
    }

    pub fn get(&self, id: &str) -> StoreResult<Option<LocalProject>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        get_project(&conn, id)
    }

    /// Find the local project linked to `remote_id`.
    ///
    /// Every write path consults this before creating a project so a remote
    /// project never ends up with two local copies.
    pub fn find_by_remote_id(&self, remote_id: &str) -> StoreResult<Option<LocalProject>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        find_by_remote(&conn, remote_id)
    }

    // ============================================================
    // Mutations
    // ============================================================

    pub fn save(&self, input: NewLocalProject) -> StoreResult<LocalProject> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        if project_exists(&tx, &input.id)? {
            return Err(StoreError::DuplicateId(input.id));
        }
        if let Some(remote_id) = &input.remote_id {
            if let Some(linked) = find_by_remote(&tx, remote_id)? {
                return Err(StoreError::RemoteIdTaken {
                    remote_id: remote_id.clone(),
                    local_id: linked.id,
                });
            }
        }

        let now = Utc::now();
        let status = input.status.unwrap_or(if input.remote_id.is_some() {
            SyncStatus::Synced
        } else {
            SyncStatus::Pending
        });
        let project = LocalProject {
            id: input.id,
            remote_id: input.remote_id,
            name: input.name,
            status,
            snapshot: input.snapshot,
            thumbnail: input.thumbnail,
            created_at: now,
            updated_at: now,
            events: Vec::new(),
            revisions: Vec::new(),
        };

        tx.execute(
            &format!(
                "INSERT INTO local_projects ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                PROJECT_COLUMNS
            ),
            rusqlite::params![
                &project.id,
                &project.remote_id,
                &project.name,
                project.status.as_str(),
                project.snapshot.primary_image.as_ref().map(Image::as_str),
                project.snapshot.generated_image.as_ref().map(Image::as_str),
                serde_json::to_string(&project.snapshot.reference_images)?,
                &project.snapshot.prompt,
                project
                    .snapshot
                    .adjustments
                    .map(|a| serde_json::to_string(&a))
                    .transpose()?,
                &project.snapshot.filter,
                &project.thumbnail,
                format_datetime(project.created_at),
                format_datetime(project.updated_at),
            ],
        )?;
        tx.commit()?;

        tracing::debug!("Saved local project {}", project.id);
        Ok(project)
    }

    pub fn update(&self, id: &str, patch: ProjectPatch) -> StoreResult<LocalProject> {
        self.modify(id, |project| {
            patch.merge_into(project);
            Ok(())
        })
    }

    /// Swap an inline artifact for its uploaded form.
    ///
    /// Returns false, leaving the project untouched, if the slot no longer
    /// holds `expected` (the user replaced it while the upload was running).
    pub fn replace_artifact(
        &self,
        id: &str,
        role: ArtifactRole,
        expected: &Image,
        replacement: Image,
    ) -> StoreResult<bool> {
        let mut replaced = false;
        self.modify(id, |project| {
            replaced = project
                .snapshot
                .replace_artifact(role, expected, replacement);
            Ok(())
        })?;
        Ok(replaced)
    }

    /// Record the remote project a local project was pushed to, without
    /// changing its sync status. Same conflict rules as [`mark_synced`].
    ///
    /// [`mark_synced`]: Database::mark_synced
    pub fn link_remote(&self, id: &str, remote_id: &str) -> StoreResult<LocalProject> {
        self.set_remote(id, remote_id, |_| None)
    }

    /// Link a project to its remote counterpart and mark it synced.
    ///
    /// Repeating the call with the same remote id is a no-op. Relinking to a
    /// different remote id is refused.
    pub fn mark_synced(&self, id: &str, remote_id: &str) -> StoreResult<LocalProject> {
        self.set_remote(id, remote_id, |_| Some(SyncStatus::Synced))
    }

    /// Link a project and mark it synced only if its name and snapshot still
    /// equal what was pushed. A project edited in the meantime is linked but
    /// keeps its status, so the next pass pushes the edit.
    pub fn mark_synced_if_unchanged(
        &self,
        id: &str,
        remote_id: &str,
        name: &str,
        snapshot: &ProjectSnapshot,
    ) -> StoreResult<LocalProject> {
        self.set_remote(id, remote_id, |project| {
            (project.name == name && project.snapshot == *snapshot).then_some(SyncStatus::Synced)
        })
    }

    fn set_remote<F>(&self, id: &str, remote_id: &str, status: F) -> StoreResult<LocalProject>
    where
        F: FnOnce(&LocalProject) -> Option<SyncStatus>,
    {
        if let Some(linked) = self.find_by_remote_id(remote_id)? {
            if linked.id != id {
                tracing::error!(
                    "Remote project {} is already linked to local project {}",
                    remote_id,
                    linked.id
                );
                return Err(StoreError::RemoteIdTaken {
                    remote_id: remote_id.to_string(),
                    local_id: linked.id,
                });
            }
        }

        self.modify(id, |project| {
            if let Some(existing) = project.remote_id.as_deref() {
                if existing != remote_id {
                    tracing::error!(
                        "Refusing to relink local project {} from {} to {}",
                        id,
                        existing,
                        remote_id
                    );
                    return Err(StoreError::RemoteIdConflict {
                        id: id.to_string(),
                        existing: existing.to_string(),
                        requested: remote_id.to_string(),
                    });
                }
            }
            project.remote_id = Some(remote_id.to_string());
            if let Some(status) = status(project) {
                project.status = status;
            }
            Ok(())
        })
    }

    pub fn append_event(&self, id: &str, event: Event) -> StoreResult<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        if !project_exists(&conn, id)? {
            return Err(StoreError::NotFound(id.to_string()));
        }

        conn.execute(
            "INSERT INTO project_events (project_id, action, body, created_at)
             VALUES (?, ?, ?, ?)",
            (
                id,
                event.action.as_str(),
                serde_json::to_string(&event)?,
                format_datetime(event.timestamp),
            ),
        )?;
        Ok(())
    }

    pub fn append_revision(&self, id: &str, revision: Revision) -> StoreResult<()> {
        if !revision.payload_matches_type() {
            return Err(StoreError::PayloadMismatch(revision.kind.as_str()));
        }

        let conn = self.conn.lock().expect("database lock poisoned");
        if !project_exists(&conn, id)? {
            return Err(StoreError::NotFound(id.to_string()));
        }

        conn.execute(
            "INSERT INTO project_revisions (id, project_id, type, body, created_at)
             VALUES (?, ?, ?, ?, ?)",
            (
                revision.id.to_string(),
                id,
                revision.kind.as_str(),
                serde_json::to_string(&revision)?,
                format_datetime(revision.timestamp),
            ),
        )?;
        Ok(())
    }

    /// Run `change` against one project and write the result back, bumping
    /// `updated_at`. Nothing is written if `change` fails.
    fn modify<F>(&self, id: &str, change: F) -> StoreResult<LocalProject>
    where
        F: FnOnce(&mut LocalProject) -> StoreResult<()>,
    {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let tx = conn.transaction()?;

        let mut project =
            get_project(&tx, id)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        change(&mut project)?;
        project.updated_at = next_timestamp(project.updated_at);

        tx.execute(
            "UPDATE local_projects SET remote_id = ?, name = ?, status = ?, primary_image = ?,
                 generated_image = ?, reference_images = ?, prompt = ?, adjustments = ?,
                 filter = ?, thumbnail = ?, updated_at = ?
             WHERE id = ?",
            rusqlite::params![
                &project.remote_id,
                &project.name,
                project.status.as_str(),
                project.snapshot.primary_image.as_ref().map(Image::as_str),
                project.snapshot.generated_image.as_ref().map(Image::as_str),
                serde_json::to_string(&project.snapshot.reference_images)?,
                &project.snapshot.prompt,
                project
                    .snapshot
                    .adjustments
                    .map(|a| serde_json::to_string(&a))
                    .transpose()?,
                &project.snapshot.filter,
                &project.thumbnail,
                format_datetime(project.updated_at),
                id,
            ],
        )?;
        tx.commit()?;

        Ok(project)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

pub fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "studio-sync")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("projects.db"))
}

fn project_exists(conn: &Connection, id: &str) -> StoreResult<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM local_projects WHERE id = ?",
        [id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn get_project(conn: &Connection, id: &str) -> StoreResult<Option<LocalProject>> {
    let sql = format!("SELECT {} FROM local_projects WHERE id = ?", PROJECT_COLUMNS);
    Ok(load_projects(conn, &sql, [id])?.pop())
}

fn find_by_remote(conn: &Connection, remote_id: &str) -> StoreResult<Option<LocalProject>> {
    let id: Option<String> = conn
        .query_row(
            "SELECT id FROM local_projects WHERE remote_id = ?",
            [remote_id],
            |row| row.get(0),
        )
        .optional()?;
    match id {
        Some(id) => get_project(conn, &id),
        None => Ok(None),
    }
}

fn load_projects<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> StoreResult<Vec<LocalProject>> {
    let mut stmt = conn.prepare(sql)?;
    let mut projects = stmt
        .query_map(params, project_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    for project in &mut projects {
        project.events = load_events(conn, &project.id)?;
        project.revisions = load_revisions(conn, &project.id)?;
    }

    Ok(projects)
}

fn project_from_row(row: &Row<'_>) -> rusqlite::Result<LocalProject> {
    let reference_images: String = row.get(6)?;
    let adjustments: Option<String> = row.get(8)?;

    Ok(LocalProject {
        id: row.get(0)?,
        remote_id: row.get(1)?,
        name: row.get(2)?,
        status: SyncStatus::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
        snapshot: ProjectSnapshot {
            primary_image: row.get::<_, Option<String>>(4)?.map(Image::from),
            generated_image: row.get::<_, Option<String>>(5)?.map(Image::from),
            reference_images: serde_json::from_str(&reference_images).unwrap_or_default(),
            prompt: row.get(7)?,
            adjustments: adjustments.and_then(|a| serde_json::from_str(&a).ok()),
            filter: row.get(9)?,
        },
        thumbnail: row.get(10)?,
        created_at: parse_datetime(row.get::<_, String>(11)?),
        updated_at: parse_datetime(row.get::<_, String>(12)?),
        events: Vec::new(),
        revisions: Vec::new(),
    })
}

fn load_events(conn: &Connection, project_id: &str) -> StoreResult<Vec<Event>> {
    let mut stmt =
        conn.prepare("SELECT body FROM project_events WHERE project_id = ? ORDER BY seq")?;
    let bodies = stmt
        .query_map([project_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(StoreError::from))
        .collect()
}

fn load_revisions(conn: &Connection, project_id: &str) -> StoreResult<Vec<Revision>> {
    let mut stmt =
        conn.prepare("SELECT body FROM project_revisions WHERE project_id = ? ORDER BY seq")?;
    let bodies = stmt
        .query_map([project_id], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    bodies
        .iter()
        .map(|body| serde_json::from_str(body).map_err(StoreError::from))
        .collect()
}

/// A timestamp strictly after `previous`, so every write advances `updated_at`.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = Utc::now();
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
