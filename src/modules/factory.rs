//! Hierarchy factories: thin wrappers over organization creation that
//! enforce the macro/micro parent invariant before touching the ledger.
//!
//! The underlying `create_aao` re-checks the invariant; the factory
//! check exists so callers get the factory-layer error before any
//! ledger work starts.

use crate::core::error::HydraError;
use crate::core::store::Store;
use crate::modules::{aao, decode, CallContext, Module};
use serde::Deserialize;
use serde_json::Value as JsonValue;

pub const MACRO_MODULE_ADDRESS: &str = "macro-factory/v1";
pub const MICRO_MODULE_ADDRESS: &str = "micro-factory/v1";

/// Create a top-level (Macro) organization.
pub fn create_macro_aao(
    store: &Store,
    caller: &str,
    topic: &str,
    duration: u64,
) -> Result<u64, HydraError> {
    aao::create_aao(store, caller, topic, duration, None)
}

/// Create a child (Micro) organization under an existing Macro AAO.
pub fn create_micro_aao(
    store: &Store,
    caller: &str,
    topic: &str,
    duration: u64,
    macro_id: u64,
) -> Result<u64, HydraError> {
    match aao::get_aao(store, macro_id) {
        Err(HydraError::NotFound(_)) => return Err(HydraError::ParentMacroAAODoesNotExist),
        Err(e) => return Err(e),
        Ok(parent) if !parent.is_macro => return Err(HydraError::ParentAAOMustBeAMacroAAO),
        Ok(_) => {}
    }
    aao::create_aao(store, caller, topic, duration, Some(macro_id))
}

pub struct MacroFactoryModule;

#[derive(Deserialize)]
struct CreateMacroParams {
    topic: String,
    duration: u64,
}

impl Module for MacroFactoryModule {
    fn address(&self) -> &'static str {
        MACRO_MODULE_ADDRESS
    }

    fn operations(&self) -> &'static [&'static str] {
        &["createMacroAAO"]
    }

    fn call(
        &self,
        store: &Store,
        ctx: &CallContext,
        operation: &str,
        payload: &JsonValue,
    ) -> Result<JsonValue, HydraError> {
        match operation {
            "createMacroAAO" => {
                let p: CreateMacroParams = decode(payload)?;
                let id = create_macro_aao(store, &ctx.caller, &p.topic, p.duration)?;
                Ok(serde_json::json!({ "aao_id": id }))
            }
            other => Err(HydraError::FunctionNotFound(other.to_string())),
        }
    }
}

pub struct MicroFactoryModule;

#[derive(Deserialize)]
struct CreateMicroParams {
    topic: String,
    duration: u64,
    macro_id: u64,
}

impl Module for MicroFactoryModule {
    fn address(&self) -> &'static str {
        MICRO_MODULE_ADDRESS
    }

    fn operations(&self) -> &'static [&'static str] {
        &["createMicroAAO"]
    }

    fn call(
        &self,
        store: &Store,
        ctx: &CallContext,
        operation: &str,
        payload: &JsonValue,
    ) -> Result<JsonValue, HydraError> {
        match operation {
            "createMicroAAO" => {
                let p: CreateMicroParams = decode(payload)?;
                let id = create_micro_aao(store, &ctx.caller, &p.topic, p.duration, p.macro_id)?;
                Ok(serde_json::json!({ "aao_id": id }))
            }
            other => Err(HydraError::FunctionNotFound(other.to_string())),
        }
    }
}
