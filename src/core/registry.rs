//! Module registry: the selector table, its controller, and the atomic
//! batch-mutation operation.
//!
//! The registry presents one stable identity over independently
//! swappable modules. It owns the `selectors` and `meta` tables; every
//! mutation routes through the broker and commits or rolls back as a
//! unit. Dispatch itself lives in [`crate::runtime::Runtime`], which
//! resolves an operation here and hands the call to the module catalog.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::HydraError;
use crate::core::selector::selector_of;
use crate::core::store::Store;
use crate::modules::{CallContext, ModuleCatalog};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

const CONTROLLER_KEY: &str = "controller";

/// Opaque module identity. The null address (empty string) is reserved:
/// `module_for` returns it for unmapped operations and `Remove` cuts
/// must carry it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleAddress(String);

impl ModuleAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn null() -> Self {
        Self(String::new())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutAction {
    Add,
    Replace,
    Remove,
}

/// One entry of a batch mutation: map, remap, or unmap a set of
/// operations for a module address. Entries apply in list order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleCut {
    pub module: ModuleAddress,
    pub action: CutAction,
    pub operations: Vec<String>,
}

/// Introspection record: one module address and every operation
/// currently routed to it.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleRecord {
    pub module: ModuleAddress,
    pub operations: Vec<String>,
}

/// Seed the controller identity. Called once, at store creation, by the
/// bootstrap path; afterwards only `transfer_control` may change it.
pub fn initialize_registry(store: &Store, controller: &str) -> Result<(), HydraError> {
    if controller.is_empty() {
        return Err(HydraError::ValidationError(
            "controller must not be the null address".to_string(),
        ));
    }
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, controller, "registry.initialize", |conn| {
        conn.execute(
            "INSERT OR REPLACE INTO meta(key, value) VALUES(?1, ?2)",
            params![CONTROLLER_KEY, controller],
        )?;
        db::record_event(
            conn,
            "ControlTransferred",
            None,
            &serde_json::json!({ "from": "", "to": controller }),
            controller,
        )?;
        Ok(())
    })
}

pub fn controller(store: &Store) -> Result<String, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "registry.controller", |conn| {
        controller_of(conn)
    })
}

pub(crate) fn controller_of(conn: &Connection) -> Result<String, HydraError> {
    conn.query_row(
        "SELECT value FROM meta WHERE key = ?1",
        params![CONTROLLER_KEY],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| HydraError::NotFound("Controller not set".to_string()))
}

/// Hand the registry to a new controller, effective immediately.
///
/// Single-step: there is no accept handshake, so transferring to an
/// address nobody holds permanently locks out registry mutation.
/// Known risk — callers must double-check the new identity.
pub fn transfer_control(
    store: &Store,
    caller: &str,
    new_controller: &str,
) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "registry.transfer_control", |conn| {
        let current = controller_of(conn)?;
        if caller != current {
            return Err(HydraError::NotController);
        }
        if new_controller.is_empty() {
            return Err(HydraError::ValidationError(
                "controller must not be the null address".to_string(),
            ));
        }
        conn.execute(
            "UPDATE meta SET value = ?2 WHERE key = ?1",
            params![CONTROLLER_KEY, new_controller],
        )?;
        db::record_event(
            conn,
            "ControlTransferred",
            None,
            &serde_json::json!({ "from": current, "to": new_controller }),
            caller,
        )?;
        Ok(())
    })
}

/// Apply a batch of selector-table mutations, then (optionally) run a
/// one-time init hook in the registry's storage context.
///
/// All-or-nothing: the cuts and the init hook share one transaction, so
/// a failure anywhere leaves the table exactly as it was. The init
/// module is resolved from the catalog and is never added to the table
/// by this call.
pub fn mutate_modules(
    store: &Store,
    catalog: &ModuleCatalog,
    caller: &str,
    cuts: &[ModuleCut],
    init: Option<(ModuleAddress, JsonValue)>,
) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "registry.mutate_modules", |conn| {
        let current = controller_of(conn)?;
        if caller != current {
            return Err(HydraError::NotController);
        }

        for cut in cuts {
            apply_cut(conn, cut)?;
        }

        if let Some((init_address, init_payload)) = &init {
            let module = catalog.get(init_address.as_str()).ok_or_else(|| {
                HydraError::NotFound(format!(
                    "Init module {} has no implementation in this runtime",
                    init_address
                ))
            })?;
            let ctx = CallContext {
                caller: caller.to_string(),
            };
            module.init(conn, &ctx, init_payload)?;
        }

        db::record_event(
            conn,
            "ModulesMutated",
            None,
            &serde_json::json!({
                "cuts": cuts,
                "init": init.as_ref().map(|(addr, _)| addr.as_str()),
            }),
            caller,
        )?;
        Ok(())
    })
}

fn apply_cut(conn: &Connection, cut: &ModuleCut) -> Result<(), HydraError> {
    match cut.action {
        CutAction::Add => {
            if cut.module.is_null() {
                return Err(HydraError::ValidationError(
                    "add requires a non-null module address".to_string(),
                ));
            }
            for operation in &cut.operations {
                let selector = selector_of(operation);
                if mapped_module(conn, &selector)?.is_some() {
                    return Err(HydraError::SelectorAlreadyMapped(operation.clone()));
                }
                conn.execute(
                    "INSERT INTO selectors(selector, operation, module) VALUES(?1, ?2, ?3)",
                    params![selector, operation, cut.module.as_str()],
                )?;
            }
        }
        CutAction::Replace => {
            if cut.module.is_null() {
                return Err(HydraError::ValidationError(
                    "replace requires a non-null module address".to_string(),
                ));
            }
            for operation in &cut.operations {
                let selector = selector_of(operation);
                let current = mapped_module(conn, &selector)?
                    .ok_or_else(|| HydraError::SelectorNotMapped(operation.clone()))?;
                if current == cut.module.as_str() {
                    return Err(HydraError::ValidationError(format!(
                        "replace target for {} must differ from current module",
                        operation
                    )));
                }
                conn.execute(
                    "UPDATE selectors SET module = ?2 WHERE selector = ?1",
                    params![selector, cut.module.as_str()],
                )?;
            }
        }
        CutAction::Remove => {
            if !cut.module.is_null() {
                return Err(HydraError::ValidationError(
                    "remove requires the null module address".to_string(),
                ));
            }
            for operation in &cut.operations {
                let selector = selector_of(operation);
                if mapped_module(conn, &selector)?.is_none() {
                    return Err(HydraError::SelectorNotMapped(operation.clone()));
                }
                conn.execute(
                    "DELETE FROM selectors WHERE selector = ?1",
                    params![selector],
                )?;
            }
        }
    }
    Ok(())
}

fn mapped_module(conn: &Connection, selector: &str) -> Result<Option<String>, HydraError> {
    Ok(conn
        .query_row(
            "SELECT module FROM selectors WHERE selector = ?1",
            params![selector],
            |row| row.get(0),
        )
        .optional()?)
}

/// Resolve an operation to its module address. Pure read; returns the
/// null address for unmapped operations, never an error.
pub fn module_for(store: &Store, operation: &str) -> Result<ModuleAddress, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);
    let selector = selector_of(operation);

    broker.with_conn(&db_path, "hydra", "registry.module_for", |conn| {
        Ok(match mapped_module(conn, &selector)? {
            Some(module) => ModuleAddress::new(module),
            None => ModuleAddress::null(),
        })
    })
}

/// List every module address with the operations routed to it.
pub fn all_modules(store: &Store) -> Result<Vec<ModuleRecord>, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "registry.all_modules", |conn| {
        let mut stmt =
            conn.prepare("SELECT module, operation FROM selectors ORDER BY module, operation")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records: Vec<ModuleRecord> = Vec::new();
        for row in rows {
            let (module, operation) = row?;
            match records.last_mut() {
                Some(record) if record.module.as_str() == module => {
                    record.operations.push(operation);
                }
                _ => records.push(ModuleRecord {
                    module: ModuleAddress::new(module),
                    operations: vec![operation],
                }),
            }
        }
        Ok(records)
    })
}
