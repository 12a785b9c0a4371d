//! Token registry module: controller-gated CRUD over token metadata.
//!
//! Pure bookkeeping — registration implies nothing about balances or
//! transfers. Uniqueness on the token address is the only invariant.

use crate::core::broker::DbBroker;
use crate::core::db;
use crate::core::error::HydraError;
use crate::core::registry;
use crate::core::store::Store;
use crate::core::time;
use crate::modules::{decode, CallContext, Module};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const MODULE_ADDRESS: &str = "token/v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub registered_at: String,
}

pub fn register_token(
    store: &Store,
    caller: &str,
    address: &str,
    name: &str,
    symbol: &str,
) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "token.register", |conn| {
        if caller != registry::controller_of(conn)? {
            return Err(HydraError::NotController);
        }
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM tokens WHERE address = ?1",
                params![address],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(HydraError::ValidationError(
                "Token already registered".to_string(),
            ));
        }
        conn.execute(
            "INSERT INTO tokens(address, name, symbol, registered_at) VALUES(?1, ?2, ?3, ?4)",
            params![address, name, symbol, time::now_epoch_z()],
        )?;
        db::record_event(
            conn,
            "TokenRegistered",
            Some(address),
            &serde_json::json!({ "address": address, "name": name, "symbol": symbol }),
            caller,
        )?;
        Ok(())
    })
}

pub fn deregister_token(store: &Store, caller: &str, address: &str) -> Result<(), HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_txn(&db_path, caller, "token.deregister", |conn| {
        if caller != registry::controller_of(conn)? {
            return Err(HydraError::NotController);
        }
        let removed = conn.execute("DELETE FROM tokens WHERE address = ?1", params![address])?;
        if removed == 0 {
            return Err(HydraError::NotFound(format!(
                "Token {} not registered",
                address
            )));
        }
        db::record_event(
            conn,
            "TokenDeregistered",
            Some(address),
            &serde_json::json!({ "address": address }),
            caller,
        )?;
        Ok(())
    })
}

pub fn is_token_registered(store: &Store, address: &str) -> Result<bool, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "token.is_registered", |conn| {
        let row: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM tokens WHERE address = ?1",
                params![address],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    })
}

pub fn get_token_info(store: &Store, address: &str) -> Result<TokenInfo, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "token.info", |conn| {
        conn.query_row(
            "SELECT address, name, symbol, registered_at FROM tokens WHERE address = ?1",
            params![address],
            |row| {
                Ok(TokenInfo {
                    address: row.get(0)?,
                    name: row.get(1)?,
                    symbol: row.get(2)?,
                    registered_at: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| HydraError::NotFound(format!("Token {} not registered", address)))
    })
}

pub fn get_registered_tokens(store: &Store) -> Result<Vec<TokenInfo>, HydraError> {
    let broker = DbBroker::new(&store.root);
    let db_path = db::ledger_db_path(&store.root);

    broker.with_conn(&db_path, "hydra", "token.list", |conn| {
        let mut stmt = conn
            .prepare("SELECT address, name, symbol, registered_at FROM tokens ORDER BY address")?;
        let rows = stmt.query_map([], |row| {
            Ok(TokenInfo {
                address: row.get(0)?,
                name: row.get(1)?,
                symbol: row.get(2)?,
                registered_at: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })
}

pub struct TokenModule;

#[derive(Deserialize)]
struct RegisterTokenParams {
    address: String,
    name: String,
    symbol: String,
}

#[derive(Deserialize)]
struct TokenAddressParams {
    address: String,
}

impl Module for TokenModule {
    fn address(&self) -> &'static str {
        MODULE_ADDRESS
    }

    fn operations(&self) -> &'static [&'static str] {
        &[
            "registerToken",
            "deregisterToken",
            "isTokenRegistered",
            "getTokenInfo",
            "getRegisteredTokens",
        ]
    }

    fn call(
        &self,
        store: &Store,
        ctx: &CallContext,
        operation: &str,
        payload: &JsonValue,
    ) -> Result<JsonValue, HydraError> {
        match operation {
            "registerToken" => {
                let p: RegisterTokenParams = decode(payload)?;
                register_token(store, &ctx.caller, &p.address, &p.name, &p.symbol)?;
                Ok(serde_json::json!({ "address": p.address }))
            }
            "deregisterToken" => {
                let p: TokenAddressParams = decode(payload)?;
                deregister_token(store, &ctx.caller, &p.address)?;
                Ok(serde_json::json!({ "address": p.address }))
            }
            "isTokenRegistered" => {
                let p: TokenAddressParams = decode(payload)?;
                Ok(serde_json::json!({
                    "is_registered": is_token_registered(store, &p.address)?
                }))
            }
            "getTokenInfo" => {
                let p: TokenAddressParams = decode(payload)?;
                let info = get_token_info(store, &p.address)?;
                Ok(serde_json::to_value(info).unwrap_or_default())
            }
            "getRegisteredTokens" => {
                let tokens = get_registered_tokens(store)?;
                Ok(serde_json::json!({ "tokens": tokens }))
            }
            other => Err(HydraError::FunctionNotFound(other.to_string())),
        }
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "token",
        "version": "0.1.0",
        "description": "Controller-gated token metadata registry",
        "storage": ["ledger.db"]
    })
}
