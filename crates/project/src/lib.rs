use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use timeline::ProjectId;

mod error;
pub use error::{StoreError, StoreResult};
mod settings;
pub use settings::EditSettings;
mod sequences;
pub use sequences::{MediaRow, SequenceRateProvider, SequenceRow, TrackRow, TrackType};
mod clips;
pub use clips::SaveOptions;
mod links;
pub use links::{ClipDependents, PropertyRow};
mod applier;
pub use applier::{ApplyOptions, ExecutedPlan};
mod resolvers;
mod command_log;
pub use command_log::{CommandRow, CommandStatus};

pub fn app_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(std::env::temp_dir);
    base.join("ripplecut")
}

pub struct ProjectDb {
    conn: Connection,
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectInfo {
    pub id: ProjectId,
    pub name: String,
    pub created_at: i64,
}

impl ProjectDb {
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let _ = conn.pragma_update(None, "cache_size", "-20000"); // ~20MB page cache
        apply_migrations(&conn)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// A throwaway database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        apply_migrations(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Starts a transaction on the shared connection. Every `ProjectDb`
    /// call made while it is alive runs inside it; dropping it without
    /// `commit` rolls everything back.
    pub fn begin_tx(&self) -> StoreResult<Transaction<'_>> {
        Ok(self.conn.unchecked_transaction()?)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ensure_project(&self, id: &ProjectId, name: &str) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        self.conn.execute(
            "INSERT OR IGNORE INTO projects(id, name, settings_json, created_at, updated_at) VALUES(?1, ?2, '{}', ?3, ?3)",
            params![id.as_str(), name, now],
        )?;
        Ok(())
    }

    pub fn list_projects(&self) -> StoreResult<Vec<ProjectInfo>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, created_at FROM projects ORDER BY created_at, id")?;
        let rows = stmt.query_map([], |row| {
            Ok(ProjectInfo {
                id: ProjectId::from(row.get::<_, String>(0)?),
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_project_settings_json(&self, project_id: &ProjectId) -> StoreResult<serde_json::Value> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT settings_json FROM projects WHERE id = ?1 LIMIT 1",
                params![project_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Err(StoreError::not_found("project", project_id)),
        }
    }

    pub fn update_project_settings_json(
        &self,
        project_id: &ProjectId,
        settings: &serde_json::Value,
    ) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp();
        let changed = self.conn.execute(
            "UPDATE projects SET settings_json = ?2, updated_at = ?3 WHERE id = ?1",
            params![project_id.as_str(), settings.to_string(), now],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("project", project_id));
        }
        Ok(())
    }
}

fn ensure_column(conn: &Connection, table: &str, column: &str, alter_sql: &str) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    let mut exists = false;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name.eq_ignore_ascii_case(column) {
            exists = true;
            break;
        }
    }
    if !exists {
        conn.execute(alter_sql, [])?;
    }
    Ok(())
}

fn record_migration(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO migrations(name, applied_at) VALUES(?1, strftime('%s','now'))",
        params![name],
    )?;
    Ok(())
}

fn apply_migrations(conn: &Connection) -> Result<()> {
    // Simple migration tracking by name
    conn.execute_batch(include_str!("../migrations/V0001__init.sql"))?;
    record_migration(conn, "V0001__init")?;
    // Track locking (V0002)
    ensure_column(
        conn,
        "tracks",
        "locked",
        "ALTER TABLE tracks ADD COLUMN locked INTEGER NOT NULL DEFAULT 0",
    )?;
    record_migration(conn, "V0002__track_lock")?;
    Ok(())
}
