//! SQLite-backed run store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::persistence::PersistenceError;
use crate::stage::StageKind;

use super::{CreateRunRequest, LinkedArtifacts, Run, RunStatus, RunStore};

const SELECT_COLUMNS: &str = "SELECT id, owner_id, tier, mode, features, status, current_step, progress, linked_artifacts, source_text, created_at, updated_at FROM runs";

/// SQLite-backed run store.
pub struct SqliteRunStore {
    conn: Mutex<Connection>,
}

impl SqliteRunStore {
    /// Create a new SQLite run store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite run store (useful for testing).
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
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                tier TEXT NOT NULL,
                mode TEXT NOT NULL,
                features TEXT NOT NULL,
                status TEXT NOT NULL,
                current_step TEXT NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                linked_artifacts TEXT NOT NULL,
                source_text TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_owner_id ON runs(owner_id);
            CREATE INDEX IF NOT EXISTS idx_runs_created_at ON runs(created_at);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, PersistenceError> {
        self.conn
            .lock()
            .map_err(|_| PersistenceError::Database("run store lock poisoned".to_string()))
    }

    fn row_to_raw(row: &rusqlite::Row) -> rusqlite::Result<RunRow> {
        Ok(RunRow {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            tier: row.get(2)?,
            mode: row.get(3)?,
            features: row.get(4)?,
            status: row.get(5)?,
            current_step: row.get(6)?,
            progress: row.get(7)?,
            linked_artifacts: row.get(8)?,
            source_text: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<Run>, PersistenceError> {
        let result = conn.query_row(
            &format!("{} WHERE id = ?", SELECT_COLUMNS),
            params![id],
            Self::row_to_raw,
        );

        match result {
            Ok(row) => row.into_run().map(Some),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn fetch_existing(conn: &Connection, id: &str) -> Result<Run, PersistenceError> {
        Self::fetch(conn, id)?.ok_or_else(|| PersistenceError::run_not_found(id))
    }

    fn write_links(
        conn: &Connection,
        mut run: Run,
        links: LinkedArtifacts,
    ) -> Result<Run, PersistenceError> {
        let now = Utc::now();
        conn.execute(
            "UPDATE runs SET linked_artifacts = ?, updated_at = ? WHERE id = ?",
            params![serde_json::to_string(&links)?, now.to_rfc3339(), run.id],
        )?;
        run.linked_artifacts = links;
        run.updated_at = now;
        Ok(run)
    }

    fn query_runs(
        conn: &Connection,
        sql: &str,
        params: &[&dyn rusqlite::ToSql],
    ) -> Result<Vec<Run>, PersistenceError> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::row_to_raw)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RunRow::into_run).collect()
    }
}

/// A row as read from SQLite, before JSON columns are decoded.
struct RunRow {
    id: String,
    owner_id: String,
    tier: String,
    mode: String,
    features: String,
    status: String,
    current_step: String,
    progress: u8,
    linked_artifacts: String,
    source_text: String,
    created_at: String,
    updated_at: String,
}

impl RunRow {
    fn into_run(self) -> Result<Run, PersistenceError> {
        Ok(Run {
            tier: self.tier.parse().map_err(PersistenceError::Serialization)?,
            mode: self.mode.parse().map_err(PersistenceError::Serialization)?,
            requested_features: serde_json::from_str(&self.features)?,
            status: serde_json::from_str(&self.status)?,
            linked_artifacts: serde_json::from_str(&self.linked_artifacts)?,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            id: self.id,
            owner_id: self.owner_id,
            current_step: self.current_step,
            progress: self.progress,
            source_text: self.source_text,
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl RunStore for SqliteRunStore {
    fn create(&self, request: CreateRunRequest) -> Result<Run, PersistenceError> {
        let conn = self.conn()?;

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let status = RunStatus::Pending;
        let current_step = "created".to_string();
        let links = LinkedArtifacts::default();

        conn.execute(
            "INSERT INTO runs (id, owner_id, tier, mode, features, status, current_step, progress, linked_artifacts, source_text, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
            params![
                id,
                request.owner_id,
                request.tier.as_str(),
                request.mode.as_str(),
                serde_json::to_string(&request.features)?,
                serde_json::to_string(&status)?,
                current_step,
                serde_json::to_string(&links)?,
                request.source_text,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )?;

        Ok(Run {
            id,
            owner_id: request.owner_id,
            tier: request.tier,
            mode: request.mode,
            requested_features: request.features,
            status,
            current_step,
            progress: 0,
            linked_artifacts: links,
            source_text: request.source_text,
            created_at: now,
            updated_at: now,
        })
    }

    fn update_status(
        &self,
        id: &str,
        status: RunStatus,
        current_step: Option<&str>,
        progress: Option<u8>,
    ) -> Result<Run, PersistenceError> {
        let conn = self.conn()?;
        let current = Self::fetch_existing(&conn, id)?;

        if !current.status.can_transition_to(&status) {
            return Err(PersistenceError::InvalidTransition {
                run_id: id.to_string(),
                from: current.status.state_type(),
                to: status.state_type(),
            });
        }

        let now = Utc::now();
        let step = current_step
            .map(str::to_string)
            .unwrap_or_else(|| current.current_step.clone());
        let progress = progress
            .map(|p| p.min(100).max(current.progress))
            .unwrap_or(current.progress);

        conn.execute(
            "UPDATE runs SET status = ?, current_step = ?, progress = ?, updated_at = ? WHERE id = ?",
            params![
                serde_json::to_string(&status)?,
                step,
                progress,
                now.to_rfc3339(),
                id
            ],
        )?;

        Ok(Run {
            status,
            current_step: step,
            progress,
            updated_at: now,
            ..current
        })
    }

    fn link_artifact(
        &self,
        id: &str,
        stage: StageKind,
        artifact_id: &str,
    ) -> Result<Run, PersistenceError> {
        let conn = self.conn()?;
        let run = Self::fetch_existing(&conn, id)?;

        let mut links = run.linked_artifacts.clone();
        links.set(stage, artifact_id);
        Self::write_links(&conn, run, links)
    }

    fn unlink_artifact(&self, id: &str, stage: StageKind) -> Result<Run, PersistenceError> {
        let conn = self.conn()?;
        let run = Self::fetch_existing(&conn, id)?;

        let mut links = run.linked_artifacts.clone();
        links.clear(stage);
        Self::write_links(&conn, run, links)
    }

    fn get(&self, id: &str) -> Result<Option<Run>, PersistenceError> {
        let conn = self.conn()?;
        Self::fetch(&conn, id)
    }

    fn list_by_owner(&self, owner_id: &str, limit: usize) -> Result<Vec<Run>, PersistenceError> {
        let conn = self.conn()?;
        Self::query_runs(
            &conn,
            &format!(
                "{} WHERE owner_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
                SELECT_COLUMNS
            ),
            params![owner_id, limit as i64],
        )
    }

    fn list_by_status(
        &self,
        state_type: &str,
        limit: usize,
    ) -> Result<Vec<Run>, PersistenceError> {
        let conn = self.conn()?;
        Self::query_runs(
            &conn,
            &format!(
                "{} WHERE json_extract(status, '$.type') = ? ORDER BY rowid ASC LIMIT ?",
                SELECT_COLUMNS
            ),
            params![state_type, limit as i64],
        )
    }

    fn count(&self, state_type: Option<&str>) -> Result<u64, PersistenceError> {
        let conn = self.conn()?;
        let count: i64 = match state_type {
            Some(state) => conn.query_row(
                "SELECT COUNT(*) FROM runs WHERE json_extract(status, '$.type') = ?",
                params![state],
                |row| row.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?,
        };
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunMode;
    use crate::tier::{FeatureSet, Tier};

    fn create_test_store() -> SqliteRunStore {
        SqliteRunStore::in_memory().unwrap()
    }

    fn create_test_request() -> CreateRunRequest {
        CreateRunRequest {
            owner_id: "test-user".to_string(),
            mode: RunMode::Hybrid,
            features: FeatureSet::all(),
            tier: Tier::Premium,
            source_text: "Ownership keeps memory safe.".to_string(),
        }
    }

    fn running() -> RunStatus {
        RunStatus::Running {
            started_at: Utc::now(),
        }
    }

    #[test]
    fn test_create_run() {
        let store = create_test_store();
        let run = store.create(create_test_request()).unwrap();

        assert!(!run.id.is_empty());
        assert_eq!(run.status, RunStatus::Pending);
        assert_eq!(run.progress, 0);
        assert!(run.linked_artifacts.is_empty());

        let fetched = store.get(&run.id).unwrap().unwrap();
        assert_eq!(fetched, run);
    }

    #[test]
    fn test_get_nonexistent_run() {
        let store = create_test_store();
        assert!(store.get("nonexistent-id").unwrap().is_none());
    }

    #[test]
    fn test_update_status() {
        let store = create_test_store();
        let run = store.create(create_test_request()).unwrap();

        let updated = store
            .update_status(&run.id, running(), Some("generating_outline"), Some(5))
            .unwrap();
        assert!(updated.status.is_running());
        assert_eq!(updated.current_step, "generating_outline");
        assert_eq!(updated.progress, 5);

        let fetched = store.get(&run.id).unwrap().unwrap();
        assert_eq!(fetched.progress, 5);
        assert_eq!(fetched.current_step, "generating_outline");
    }

    #[test]
    fn test_progress_never_decreases() {
        let store = create_test_store();
        let run = store.create(create_test_request()).unwrap();

        store
            .update_status(&run.id, running(), None, Some(45))
            .unwrap();
        let updated = store
            .update_status(&run.id, running(), None, Some(15))
            .unwrap();
        assert_eq!(updated.progress, 45);

        let updated = store.update_status(&run.id, running(), None, None).unwrap();
        assert_eq!(updated.progress, 45);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let store = create_test_store();
        let run = store.create(create_test_request()).unwrap();

        let result = store.update_status(
            &run.id,
            RunStatus::Paused {
                reason: "review_required".to_string(),
                paused_at: Utc::now(),
            },
            None,
            None,
        );
        assert!(matches!(
            result,
            Err(PersistenceError::InvalidTransition {
                from: "pending",
                to: "paused",
                ..
            })
        ));
    }

    #[test]
    fn test_update_nonexistent_run() {
        let store = create_test_store();
        let result = store.update_status("nonexistent-id", running(), None, None);
        assert!(matches!(result, Err(PersistenceError::NotFound { .. })));
    }

    #[test]
    fn test_failed_status_round_trip() {
        let store = create_test_store();
        let run = store.create(create_test_request()).unwrap();
        store.update_status(&run.id, running(), None, Some(45)).unwrap();

        store
            .update_status(
                &run.id,
                RunStatus::Failed {
                    error_message: "audio generation failed".to_string(),
                    error_detail: Some("compensation of outline failed".to_string()),
                    failed_at: Utc::now(),
                },
                Some("failed"),
                None,
            )
            .unwrap();

        let fetched = store.get(&run.id).unwrap().unwrap();
        assert_eq!(fetched.error_message(), Some("audio generation failed"));
        assert_eq!(fetched.progress, 45);
    }

    #[test]
    fn test_link_and_unlink_artifacts() {
        let store = create_test_store();
        let run = store.create(create_test_request()).unwrap();

        store
            .link_artifact(&run.id, StageKind::Outline, "artifact-1")
            .unwrap();
        let linked = store
            .link_artifact(&run.id, StageKind::Narration, "artifact-2")
            .unwrap();
        assert_eq!(linked.linked_artifacts.len(), 2);

        let unlinked = store.unlink_artifact(&run.id, StageKind::Outline).unwrap();
        assert_eq!(unlinked.linked_artifacts.get(StageKind::Outline), None);

        let fetched = store.get(&run.id).unwrap().unwrap();
        assert_eq!(
            fetched.linked_artifacts.get(StageKind::Narration),
            Some("artifact-2")
        );
        assert_eq!(fetched.linked_artifacts.len(), 1);
    }

    #[test]
    fn test_list_by_owner() {
        let store = create_test_store();

        for owner in ["alice", "alice", "bob"] {
            let mut request = create_test_request();
            request.owner_id = owner.to_string();
            store.create(request).unwrap();
        }

        let runs = store.list_by_owner("alice", 10).unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().all(|r| r.owner_id == "alice"));

        let runs = store.list_by_owner("alice", 1).unwrap();
        assert_eq!(runs.len(), 1);
    }

    #[test]
    fn test_list_by_status() {
        let store = create_test_store();
        let first = store.create(create_test_request()).unwrap();
        store.create(create_test_request()).unwrap();
        store.update_status(&first.id, running(), None, None).unwrap();

        let running_runs = store.list_by_status("running", 10).unwrap();
        assert_eq!(running_runs.len(), 1);
        assert_eq!(running_runs[0].id, first.id);

        assert_eq!(store.list_by_status("pending", 10).unwrap().len(), 1);
        assert_eq!(store.count(Some("running")).unwrap(), 1);
        assert_eq!(store.count(None).unwrap(), 2);
    }

    #[test]
    fn test_file_based_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("runs.db");

        let store = SqliteRunStore::new(&db_path).unwrap();
        let run = store.create(create_test_request()).unwrap();

        assert!(db_path.exists());
        assert!(store.get(&run.id).unwrap().is_some());
    }
}
