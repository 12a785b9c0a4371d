use crate::core::error;
use crate::core::schemas;
use crate::core::time;
use rusqlite::{params, Connection};
use serde_json::Value as JsonValue;
use std::fs;
use std::path::{Path, PathBuf};

pub fn db_connect(db_path: &str) -> Result<Connection, error::HydraError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
        .map_err(error::HydraError::RusqliteError)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::HydraError::RusqliteError)?;
    conn.execute("PRAGMA foreign_keys=ON;", [])
        .map_err(error::HydraError::RusqliteError)?;
    Ok(conn)
}

pub fn ledger_db_path(root: &Path) -> PathBuf {
    root.join(schemas::LEDGER_DB_NAME)
}

/// Create the ledger database with every table the built-in modules own.
/// Idempotent; schema statements are all CREATE IF NOT EXISTS.
pub fn initialize_ledger_db(root: &Path) -> Result<(), error::HydraError> {
    let db_path = ledger_db_path(root);
    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).map_err(error::HydraError::IoError)?;
    }

    let conn = db_connect(&db_path.to_string_lossy())?;
    for stmt in schemas::LEDGER_DB_SCHEMA {
        conn.execute(stmt, [])?;
    }
    Ok(())
}

/// Append one row to the shared event journal. Runs on the caller's
/// open connection so the record commits or rolls back with the call.
pub fn record_event(
    conn: &Connection,
    event_type: &str,
    subject_id: Option<&str>,
    payload: &JsonValue,
    actor: &str,
) -> Result<(), error::HydraError> {
    conn.execute(
        "INSERT INTO ledger_events(event_id, ts, event_type, subject_id, payload, actor)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            time::new_event_id(),
            time::now_epoch_z(),
            event_type,
            subject_id,
            payload.to_string(),
            actor
        ],
    )?;
    Ok(())
}

/// Take the next value of a dense monotonic counter (`next_aao_id`,
/// `next_proposal_id`, `next_task_id`). Read-and-bump happens on the
/// caller's transaction; the broker lock keeps it single-writer.
pub fn next_counter(conn: &Connection, key: &str) -> Result<u64, error::HydraError> {
    conn.execute(
        "INSERT OR IGNORE INTO meta(key, value) VALUES(?1, '0')",
        params![key],
    )?;
    let current: String = conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )?;
    let id: u64 = current.parse().map_err(|_| {
        error::HydraError::ValidationError(format!("counter {} is corrupt: {}", key, current))
    })?;
    conn.execute(
        "UPDATE meta SET value = ?2 WHERE key = ?1",
        params![key, (id + 1).to_string()],
    )?;
    Ok(id)
}
