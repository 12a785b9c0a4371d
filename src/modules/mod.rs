//! Module implementations and the catalog that binds addresses to code.
//!
//! A module is an independently addressable unit of governance logic.
//! It owns a disjoint set of tables in the shared ledger and exposes
//! operations the registry routes to it. The catalog is the runtime's
//! view of which addresses carry an implementation; the selector table
//! decides which of those addresses each operation reaches.

pub mod aao;
pub mod factory;
pub mod token;

use crate::core::config::HydraConfig;
use crate::core::error::HydraError;
use crate::core::store::Store;
use rusqlite::Connection;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// Identity of the caller a dispatched operation runs on behalf of.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub caller: String,
}

pub trait Module: Send + Sync {
    /// Stable module address, e.g. `aao/v1`.
    fn address(&self) -> &'static str;

    /// Operations this module implements. Used by the genesis cut; the
    /// selector table remains the routing authority afterwards.
    fn operations(&self) -> &'static [&'static str];

    /// Execute one dispatched operation against the shared store.
    fn call(
        &self,
        store: &Store,
        ctx: &CallContext,
        operation: &str,
        payload: &JsonValue,
    ) -> Result<JsonValue, HydraError>;

    /// One-time migration hook, run by `mutate_modules` on the open
    /// registry transaction. Most modules have none.
    fn init(
        &self,
        _conn: &Connection,
        _ctx: &CallContext,
        _payload: &JsonValue,
    ) -> Result<(), HydraError> {
        Err(HydraError::ValidationError(format!(
            "module {} has no init hook",
            self.address()
        )))
    }
}

/// Genesis init module: seeds the dense id counters when the bootstrap
/// cut runs. Carries no operations, so it is never routed to — init
/// modules run once and stay out of the selector table.
pub struct GenesisInit;

impl Module for GenesisInit {
    fn address(&self) -> &'static str {
        "genesis-init/v1"
    }

    fn operations(&self) -> &'static [&'static str] {
        &[]
    }

    fn call(
        &self,
        _store: &Store,
        _ctx: &CallContext,
        operation: &str,
        _payload: &JsonValue,
    ) -> Result<JsonValue, HydraError> {
        Err(HydraError::FunctionNotFound(operation.to_string()))
    }

    fn init(
        &self,
        conn: &Connection,
        _ctx: &CallContext,
        _payload: &JsonValue,
    ) -> Result<(), HydraError> {
        for key in ["next_aao_id", "next_proposal_id", "next_task_id"] {
            conn.execute(
                "INSERT OR IGNORE INTO meta(key, value) VALUES(?1, '0')",
                rusqlite::params![key],
            )?;
        }
        Ok(())
    }
}

/// All module implementations this runtime binary carries, keyed by
/// address. Swapping a module is a registry cut plus a catalog entry;
/// the ledger stays put.
pub struct ModuleCatalog {
    modules: FxHashMap<&'static str, Box<dyn Module>>,
}

impl ModuleCatalog {
    pub fn builtin(config: &HydraConfig) -> Self {
        let mut modules: FxHashMap<&'static str, Box<dyn Module>> = FxHashMap::default();
        for module in [
            Box::new(aao::AaoModule::new(config.governance.quorum)) as Box<dyn Module>,
            Box::new(factory::MacroFactoryModule),
            Box::new(factory::MicroFactoryModule),
            Box::new(token::TokenModule),
            Box::new(GenesisInit),
        ] {
            modules.insert(module.address(), module);
        }
        Self { modules }
    }

    pub fn get(&self, address: &str) -> Option<&dyn Module> {
        self.modules.get(address).map(|m| m.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Module> {
        self.modules.values().map(|m| m.as_ref())
    }
}

/// Decode a dispatched payload into a module's typed parameters.
pub(crate) fn decode<T: DeserializeOwned>(payload: &JsonValue) -> Result<T, HydraError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| HydraError::ValidationError(format!("invalid payload: {}", e)))
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "modules",
        "version": "0.1.0",
        "description": "Module catalog bound to the selector table",
        "storage": ["ledger.db"]
    })
}
