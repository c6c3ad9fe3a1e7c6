use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

use crate::plan::{is_valid_rpe, CompletedSessionRecord, ExerciseEffortLog, PlanError, SessionPlan};
use crate::profile::{Profile, ProfileError};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("stored data is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
    #[error("snapshot rejected: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Why an imported snapshot was refused. Nothing is written when any of
/// these is returned.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("not a valid snapshot: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid profile: {0}")]
    Profile(#[from] ProfileError),
    #[error("session on {date} has a malformed plan: {source}")]
    Plan {
        date: NaiveDate,
        #[source]
        source: PlanError,
    },
    #[error("session on {date} has rating {rpe}, expected 1-10")]
    SessionRating { date: NaiveDate, rpe: u8 },
    #[error("effort log for {exercise_id} has rating {rpe}, expected 1-10")]
    LogRating { exercise_id: String, rpe: u8 },
    #[error("effort log refers to unknown session {0}")]
    DanglingLog(i64),
    #[error("session id {0} appears more than once")]
    DuplicateSession(i64),
}

/// Full export of everything the store holds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub exported_at: String,
    pub app_version: String,
    pub profile: Option<Profile>,
    #[serde(default)]
    pub sessions: Vec<CompletedSessionRecord>,
    #[serde(default)]
    pub effort_logs: Vec<ExerciseEffortLog>,
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl Snapshot {
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), SnapshotError> {
        if let Some(profile) = &self.profile {
            profile.validate()?;
        }

        let mut ids = Vec::with_capacity(self.sessions.len());
        for session in &self.sessions {
            session.plan.validate().map_err(|source| SnapshotError::Plan {
                date: session.date,
                source,
            })?;
            if let Some(rpe) = session.rpe.filter(|r| !is_valid_rpe(*r)) {
                return Err(SnapshotError::SessionRating {
                    date: session.date,
                    rpe,
                });
            }
            if let Some(id) = session.id {
                if ids.contains(&id) {
                    return Err(SnapshotError::DuplicateSession(id));
                }
                ids.push(id);
            }
        }

        for log in &self.effort_logs {
            if !is_valid_rpe(log.rpe) {
                return Err(SnapshotError::LogRating {
                    exercise_id: log.exercise_id.clone(),
                    rpe: log.rpe,
                });
            }
            if !ids.contains(&log.session_id) {
                return Err(SnapshotError::DanglingLog(log.session_id));
            }
        }
        Ok(())
    }
}

/// Persistence operations the coach relies on
pub trait Store {
    fn get_profile(&self) -> Result<Option<Profile>, StoreError>;
    fn save_profile(&self, profile: &Profile) -> Result<(), StoreError>;
    /// Append a finished session, returning its id
    fn insert_session(&self, record: &CompletedSessionRecord) -> Result<i64, StoreError>;
    fn insert_effort_log(&self, log: &ExerciseEffortLog) -> Result<(), StoreError>;
    /// Store a finished session together with its effort logs and, when
    /// given, the updated profile. Either everything is written or nothing
    /// is. The `session_id` of each log is replaced by the new session id.
    fn record_session(
        &mut self,
        record: &CompletedSessionRecord,
        logs: &[ExerciseEffortLog],
        profile: Option<&Profile>,
    ) -> Result<i64, StoreError>;
    fn session_on(&self, date: NaiveDate) -> Result<Option<CompletedSessionRecord>, StoreError>;
    /// Newest first
    fn recent_sessions(&self, limit: usize) -> Result<Vec<CompletedSessionRecord>, StoreError>;
    /// Oldest first
    fn all_sessions(&self) -> Result<Vec<CompletedSessionRecord>, StoreError>;
    fn effort_logs(&self) -> Result<Vec<ExerciseEffortLog>, StoreError>;
    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn clear_all(&mut self) -> Result<(), StoreError>;
    fn export_snapshot(&self) -> Result<Snapshot, StoreError>;
    /// Replace all data with the snapshot, or change nothing on error
    fn import_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profile (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    data TEXT NOT NULL,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL,
    plan TEXT NOT NULL,
    completed_exercise_ids TEXT NOT NULL,
    rpe INTEGER,
    duration_actual_s INTEGER NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
);
CREATE INDEX IF NOT EXISTS idx_sessions_date ON sessions(date);
CREATE TABLE IF NOT EXISTS exercise_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    exercise_id TEXT NOT NULL,
    rpe INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_exercise_logs_exercise ON exercise_logs(exercise_id);
CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

const SESSION_COLUMNS: &str = "id, date, plan, completed_exercise_ids, rpe, duration_actual_s";

/// SQLite-backed store
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened database");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }
}

struct SessionRow {
    id: i64,
    date: String,
    plan: String,
    completed: String,
    rpe: Option<u8>,
    duration_actual_s: u32,
}

impl SessionRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            date: row.get(1)?,
            plan: row.get(2)?,
            completed: row.get(3)?,
            rpe: row.get(4)?,
            duration_actual_s: row.get(5)?,
        })
    }
}

impl TryFrom<SessionRow> for CompletedSessionRecord {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let date = row
            .date
            .parse::<NaiveDate>()
            .map_err(|e| StoreError::Corrupt(format!("session {} date {:?}: {e}", row.id, row.date)))?;
        let plan: SessionPlan = serde_json::from_str(&row.plan)?;
        let completed_exercise_ids: Vec<String> = serde_json::from_str(&row.completed)?;
        Ok(Self {
            id: Some(row.id),
            date,
            plan,
            completed_exercise_ids,
            rpe: row.rpe,
            duration_actual_s: row.duration_actual_s,
        })
    }
}

fn query_sessions(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<CompletedSessionRecord>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, SessionRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(CompletedSessionRecord::try_from).collect()
}

fn write_profile(conn: &Connection, profile: &Profile) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO profile (id, data) VALUES (1, ?1)
         ON CONFLICT(id) DO UPDATE SET data = excluded.data, updated_at = CURRENT_TIMESTAMP",
        params![serde_json::to_string(profile)?],
    )?;
    Ok(())
}

fn write_session(conn: &Connection, record: &CompletedSessionRecord) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO sessions (date, plan, completed_exercise_ids, rpe, duration_actual_s)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.date.to_string(),
            serde_json::to_string(&record.plan)?,
            serde_json::to_string(&record.completed_exercise_ids)?,
            record.rpe,
            record.duration_actual_s,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn write_effort_log(conn: &Connection, log: &ExerciseEffortLog) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO exercise_logs (session_id, exercise_id, rpe) VALUES (?1, ?2, ?3)",
        params![log.session_id, log.exercise_id, log.rpe],
    )?;
    Ok(())
}

fn write_setting(conn: &Connection, key: &str, value: &str) -> Result<(), StoreError> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

fn wipe(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "DELETE FROM exercise_logs; DELETE FROM sessions; DELETE FROM profile; DELETE FROM settings;",
    )?;
    Ok(())
}

impl Store for SqliteStore {
    fn get_profile(&self) -> Result<Option<Profile>, StoreError> {
        let data: Option<String> = self
            .conn
            .query_row("SELECT data FROM profile WHERE id = 1", [], |row| row.get(0))
            .optional()?;
        match data {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save_profile(&self, profile: &Profile) -> Result<(), StoreError> {
        write_profile(&self.conn, profile)?;
        tracing::debug!("profile saved");
        Ok(())
    }

    fn insert_session(&self, record: &CompletedSessionRecord) -> Result<i64, StoreError> {
        let id = write_session(&self.conn, record)?;
        tracing::info!(id, date = %record.date, "session recorded");
        Ok(id)
    }

    fn insert_effort_log(&self, log: &ExerciseEffortLog) -> Result<(), StoreError> {
        write_effort_log(&self.conn, log)
    }

    fn record_session(
        &mut self,
        record: &CompletedSessionRecord,
        logs: &[ExerciseEffortLog],
        profile: Option<&Profile>,
    ) -> Result<i64, StoreError> {
        let tx = self.conn.transaction()?;
        let session_id = write_session(&tx, record)?;
        for log in logs {
            write_effort_log(
                &tx,
                &ExerciseEffortLog {
                    session_id,
                    ..log.clone()
                },
            )?;
        }
        if let Some(profile) = profile {
            write_profile(&tx, profile)?;
        }
        tx.commit()?;

        tracing::info!(id = session_id, date = %record.date, logs = logs.len(), "session recorded");
        Ok(session_id)
    }

    fn session_on(&self, date: NaiveDate) -> Result<Option<CompletedSessionRecord>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE date = ?1 ORDER BY id DESC LIMIT 1");
        Ok(query_sessions(&self.conn, &sql, params![date.to_string()])?
            .into_iter()
            .next())
    }

    fn recent_sessions(&self, limit: usize) -> Result<Vec<CompletedSessionRecord>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY date DESC, id DESC LIMIT ?1");
        query_sessions(&self.conn, &sql, params![limit as i64])
    }

    fn all_sessions(&self) -> Result<Vec<CompletedSessionRecord>, StoreError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions ORDER BY date ASC, id ASC");
        query_sessions(&self.conn, &sql, [])
    }

    fn effort_logs(&self) -> Result<Vec<ExerciseEffortLog>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT session_id, exercise_id, rpe FROM exercise_logs ORDER BY id")?;
        let logs = stmt
            .query_map([], |row| {
                Ok(ExerciseEffortLog {
                    session_id: row.get(0)?,
                    exercise_id: row.get(1)?,
                    rpe: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(logs)
    }

    fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        write_setting(&self.conn, key, value)
    }

    fn clear_all(&mut self) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        wipe(&tx)?;
        tx.commit()?;
        tracing::warn!("all stored data cleared");
        Ok(())
    }

    fn export_snapshot(&self) -> Result<Snapshot, StoreError> {
        let mut stmt = self.conn.prepare("SELECT key, value FROM settings ORDER BY key")?;
        let settings = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<BTreeMap<_, _>>>()?;

        Ok(Snapshot {
            exported_at: Local::now().to_rfc3339(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            profile: self.get_profile()?,
            sessions: self.all_sessions()?,
            effort_logs: self.effort_logs()?,
            settings,
        })
    }

    fn import_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), StoreError> {
        snapshot.validate()?;

        let tx = self.conn.transaction()?;
        wipe(&tx)?;
        if let Some(profile) = &snapshot.profile {
            write_profile(&tx, profile)?;
        }

        let mut id_map: HashMap<i64, i64> = HashMap::new();
        for session in &snapshot.sessions {
            let new_id = write_session(&tx, session)?;
            if let Some(old_id) = session.id {
                id_map.insert(old_id, new_id);
            }
        }
        for log in &snapshot.effort_logs {
            let session_id = id_map
                .get(&log.session_id)
                .copied()
                .ok_or(SnapshotError::DanglingLog(log.session_id))?;
            write_effort_log(
                &tx,
                &ExerciseEffortLog {
                    session_id,
                    ..log.clone()
                },
            )?;
        }
        for (key, value) in &snapshot.settings {
            write_setting(&tx, key, value)?;
        }
        tx.commit()?;

        tracing::info!(
            sessions = snapshot.sessions.len(),
            logs = snapshot.effort_logs.len(),
            "snapshot imported"
        );
        Ok(())
    }
}
