//! Store abstraction for Hydra's ledger workspace.
//!
//! A store is the single persistent state space every module executes
//! against. The registry owns it; modules own disjoint tables inside it.

use std::path::PathBuf;

/// Handle to a Hydra ledger workspace.
///
/// All state — the selector table, the controller record, and every
/// governance-module table — lives under one root (`.hydra/data/` in an
/// initialized project). There is no per-module storage: a module keeps
/// its state in its own tables of the shared ledger, so swapping a
/// module implementation never strands data.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory.
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}
