//! SQLite-backed artifact store.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::persistence::PersistenceError;
use crate::stage::StageKind;

use super::{ArtifactContent, ArtifactStore, StoredArtifact};

const SELECT_COLUMNS: &str = "SELECT id, run_id, kind, content, created_at, updated_at FROM artifacts";

/// SQLite-backed artifact store.
pub struct SqliteArtifactStore {
    conn: Mutex<Connection>,
}

impl SqliteArtifactStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), PersistenceError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                run_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_artifacts_run_id ON artifacts(run_id);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|_| PersistenceError::Database("artifact store lock poisoned".to_string()))
    }

    fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<ArtifactRow> {
        Ok(ArtifactRow {
            id: row.get(0)?,
            run_id: row.get(1)?,
            content_json: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<StoredArtifact>, PersistenceError> {
        let result = conn.query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_raw,
        );

        match result {
            Ok(row) => row.into_artifact().map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// A row as read from SQLite, before the JSON content is decoded.
struct ArtifactRow {
    id: String,
    run_id: String,
    content_json: String,
    created_at: String,
    updated_at: String,
}

impl ArtifactRow {
    fn into_artifact(self) -> Result<StoredArtifact, PersistenceError> {
        Ok(StoredArtifact {
            content: serde_json::from_str(&self.content_json)?,
            id: self.id,
            run_id: self.run_id,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl ArtifactStore for SqliteArtifactStore {
    fn put(
        &self,
        run_id: &str,
        content: ArtifactContent,
    ) -> Result<StoredArtifact, PersistenceError> {
        let conn = self.conn()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let content_json = serde_json::to_string(&content)?;

        conn.execute(
            "INSERT INTO artifacts (id, run_id, kind, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                run_id,
                content.kind().as_str(),
                content_json,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(StoredArtifact {
            id,
            run_id: run_id.to_string(),
            content,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<StoredArtifact>, PersistenceError> {
        let conn = self.conn()?;
        Self::fetch(&conn, id)
    }

    fn replace(
        &self,
        id: &str,
        content: ArtifactContent,
    ) -> Result<StoredArtifact, PersistenceError> {
        let conn = self.conn()?;

        let current =
            Self::fetch(&conn, id)?.ok_or_else(|| PersistenceError::artifact_not_found(id))?;

        let now = Utc::now();
        let content_json = serde_json::to_string(&content)?;

        conn.execute(
            "UPDATE artifacts SET kind = ?, content = ?, updated_at = ? WHERE id = ?",
            params![content.kind().as_str(), content_json, now.to_rfc3339(), id],
        )?;

        Ok(StoredArtifact {
            content,
            updated_at: now,
            ..current
        })
    }

    fn delete(&self, id: &str) -> Result<StoredArtifact, PersistenceError> {
        let conn = self.conn()?;

        let artifact =
            Self::fetch(&conn, id)?.ok_or_else(|| PersistenceError::artifact_not_found(id))?;

        conn.execute("DELETE FROM artifacts WHERE id = ?", params![id])?;

        Ok(artifact)
    }

    fn list_by_run(
        &self,
        run_id: &str,
        kind: Option<StageKind>,
    ) -> Result<Vec<StoredArtifact>, PersistenceError> {
        let conn = self.conn()?;

        let mut sql = format!("{} WHERE run_id = ?1", SELECT_COLUMNS);
        if kind.is_some() {
            sql.push_str(" AND kind = ?2");
        }
        sql.push_str(" ORDER BY rowid ASC");

        let mut stmt = conn.prepare(&sql)?;
        let rows = match kind {
            Some(kind) => stmt
                .query_map(params![run_id, kind.as_str()], Self::row_to_raw)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![run_id], Self::row_to_raw)?
                .collect::<Result<Vec<_>, _>>()?,
        };

        rows.into_iter().map(ArtifactRow::into_artifact).collect()
    }
}
