#![forbid(unsafe_code)]

mod error;
mod events;
mod members;
mod projects;
mod requests;
mod stages;
mod users;

pub use error::StoreError;
pub use requests::*;

use rusqlite::{Connection, OptionalExtension, Transaction, params};
use st_core::ids::ProjectId;
use st_core::model::ProjectRole;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DB_FILE: &str = "stagetrack.db";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: PathBuf,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let conn = Connection::open(storage_dir.join(DB_FILE))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        install_schema(&conn)?;

        Ok(Self { conn, storage_dir })
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }
}

fn install_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
          id TEXT PRIMARY KEY,
          email TEXT NOT NULL UNIQUE,
          username TEXT NOT NULL UNIQUE,
          display_name TEXT NOT NULL,
          role TEXT NOT NULL DEFAULT 'user',
          created_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
          id TEXT PRIMARY KEY,
          name TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          updated_at_ms INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stages (
          id TEXT NOT NULL,
          project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
          title TEXT NOT NULL,
          "order" INTEGER NOT NULL,
          status TEXT NOT NULL,
          assignee_id TEXT,
          notes TEXT,
          started_at_ms INTEGER,
          finished_at_ms INTEGER,
          PRIMARY KEY (project_id, id)
        );

        CREATE TABLE IF NOT EXISTS memberships (
          project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
          user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
          role TEXT NOT NULL,
          created_at_ms INTEGER NOT NULL,
          PRIMARY KEY (project_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS events (
          seq INTEGER PRIMARY KEY AUTOINCREMENT,
          ts_ms INTEGER NOT NULL,
          project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
          stage_id TEXT,
          type TEXT NOT NULL,
          payload_json TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_stages_project_order ON stages(project_id, "order");
        CREATE INDEX IF NOT EXISTS idx_memberships_user ON memberships(user_id);
        CREATE INDEX IF NOT EXISTS idx_events_project_seq ON events(project_id, seq);
        "#,
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES (?1, ?2)",
        params!["schema_version", "v1"],
    )?;
    Ok(())
}

pub(crate) fn now_ms() -> i64 {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    now.as_millis() as i64
}

/// Membership lookup for one project. `None` means either the project does
/// not exist or the user is not a member; callers treat both as an unknown
/// project so non-members learn nothing.
pub(crate) fn role_of(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<Option<ProjectRole>, StoreError> {
    let raw = conn
        .query_row(
            "SELECT role FROM memberships WHERE project_id = ?1 AND user_id = ?2",
            params![project_id, user_id],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    match raw {
        None => Ok(None),
        Some(raw) => Ok(Some(
            ProjectRole::parse(&raw).ok_or(StoreError::InvalidInput("unknown role in store"))?,
        )),
    }
}

/// Resolve the actor against a project, hiding projects from non-members.
pub(crate) fn require_member(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<ProjectRole, StoreError> {
    match role_of(conn, project_id, user_id)? {
        Some(role) => Ok(role),
        None => Err(StoreError::UnknownProject),
    }
}

pub(crate) fn require_admin(
    conn: &Connection,
    project_id: &str,
    user_id: &str,
) -> Result<(), StoreError> {
    match require_member(conn, project_id, user_id)? {
        ProjectRole::Admin => Ok(()),
        ProjectRole::Executor => Err(StoreError::Forbidden),
    }
}

pub(crate) fn project_exists(conn: &Connection, project_id: &str) -> Result<bool, StoreError> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM projects WHERE id = ?1",
            params![project_id],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub(crate) fn insert_event_tx(
    tx: &Transaction<'_>,
    ts_ms: i64,
    project_id: &str,
    stage_id: Option<&str>,
    event_type: &str,
    payload_json: &str,
) -> Result<(), StoreError> {
    tx.execute(
        r#"
        INSERT INTO events(ts_ms, project_id, stage_id, type, payload_json)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![ts_ms, project_id, stage_id, event_type, payload_json],
    )?;
    Ok(())
}

pub(crate) fn validate_project_id(raw: &str) -> Result<ProjectId, StoreError> {
    ProjectId::try_new(raw).map_err(|_| {
        StoreError::InvalidInput(
            "project id must be 1..=128 chars: alphanumeric first, then alphanumeric or . _ -",
        )
    })
}
