use crate::core::db;
use crate::core::error;
use crate::core::schemas;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use ulid::Ulid;

/// The broker is the "thin waist" for ledger access: every call runs
/// under an in-process lock, gets its own connection, and leaves one
/// audit record behind. Execution is strictly serialized — one call
/// runs to completion (or rolls back) before the next begins.
pub struct DbBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub status: String,
}

static DB_LOCK: Mutex<()> = Mutex::new(());

impl DbBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join(schemas::BROKER_EVENTS_NAME),
        }
    }

    /// Execute a read-only closure with a serialized connection.
    pub fn with_conn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, error::HydraError>
    where
        F: FnOnce(&Connection) -> Result<R, error::HydraError>,
    {
        let _lock = DB_LOCK.lock().unwrap();
        let conn = db::db_connect(&db_path.to_string_lossy())?;

        let result = f(&conn);

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, op_name, status)?;
        result
    }

    /// Execute a mutating closure inside one SQLite transaction. The
    /// transaction commits only when the closure succeeds; any error
    /// rolls back every statement the closure ran. This is the carrier
    /// for all-or-nothing call semantics, including the registry's
    /// batch cut.
    pub fn with_txn<F, R>(
        &self,
        db_path: &Path,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, error::HydraError>
    where
        F: FnOnce(&Connection) -> Result<R, error::HydraError>,
    {
        let _lock = DB_LOCK.lock().unwrap();
        let conn = db::db_connect(&db_path.to_string_lossy())?;
        let txn = conn.unchecked_transaction()?;

        let result = f(&txn);
        let result = match result {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                // Dropping the transaction rolls it back.
                drop(txn);
                Err(e)
            }
        };

        let status = if result.is_ok() { "success" } else { "error" };
        self.log_event(actor, op_name, status)?;
        result
    }

    fn log_event(&self, actor: &str, op: &str, status: &str) -> Result<(), error::HydraError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = BrokerEvent {
            ts: crate::core::time::now_epoch_z(),
            event_id: Ulid::new().to_string(),
            actor: actor.to_string(),
            op: op.to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(error::HydraError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev).unwrap())
            .map_err(error::HydraError::IoError)?;
        Ok(())
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "broker",
        "version": "0.1.0",
        "description": "Serialized ledger access with transactional mutation",
        "storage": ["ledger.db", "broker.events.jsonl"]
    })
}
