//! Runtime binding of the three layers: the shared store, the selector
//! table, and the module catalog.
//!
//! Dispatch resolves the operation in the table, looks the address up
//! in the catalog, and runs the module against the runtime's store.
//! The module executes in the caller's storage space — there is no
//! per-module state to attach, only the one ledger.

use crate::core::config::HydraConfig;
use crate::core::error::HydraError;
use crate::core::registry::{self, CutAction, ModuleAddress, ModuleCut};
use crate::core::store::Store;
use crate::modules::{CallContext, ModuleCatalog};
use serde_json::Value as JsonValue;

pub struct Runtime {
    store: Store,
    catalog: ModuleCatalog,
}

impl Runtime {
    pub fn open(store: Store, config: &HydraConfig) -> Self {
        Self {
            store,
            catalog: ModuleCatalog::builtin(config),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    /// Route one inbound call. Registry entry points are not routable:
    /// `mutate_modules`, `module_for`, `all_modules` and
    /// `transfer_control` live on the registry itself, everything else
    /// goes through here.
    pub fn dispatch(
        &self,
        caller: &str,
        operation: &str,
        payload: &JsonValue,
    ) -> Result<JsonValue, HydraError> {
        let address = registry::module_for(&self.store, operation)?;
        if address.is_null() {
            return Err(HydraError::FunctionNotFound(operation.to_string()));
        }
        let module = self.catalog.get(address.as_str()).ok_or_else(|| {
            HydraError::NotFound(format!(
                "Module {} has no implementation in this runtime",
                address
            ))
        })?;
        let ctx = CallContext {
            caller: caller.to_string(),
        };
        module.call(&self.store, &ctx, operation, payload)
    }

    pub fn mutate_modules(
        &self,
        caller: &str,
        cuts: &[ModuleCut],
        init: Option<(ModuleAddress, JsonValue)>,
    ) -> Result<(), HydraError> {
        registry::mutate_modules(&self.store, &self.catalog, caller, cuts, init)
    }

    /// The bootstrap cut: map every operation of every built-in module,
    /// then run the genesis init hook. `hydra init` calls this once,
    /// right after seeding the controller.
    pub fn genesis_cut(&self, caller: &str) -> Result<(), HydraError> {
        let mut cuts: Vec<ModuleCut> = self
            .catalog
            .iter()
            .filter(|m| !m.operations().is_empty())
            .map(|m| ModuleCut {
                module: ModuleAddress::new(m.address()),
                action: CutAction::Add,
                operations: m.operations().iter().map(|op| op.to_string()).collect(),
            })
            .collect();
        cuts.sort_by(|a, b| a.module.as_str().cmp(b.module.as_str()));

        self.mutate_modules(
            caller,
            &cuts,
            Some((ModuleAddress::new("genesis-init/v1"), JsonValue::Null)),
        )
    }
}
