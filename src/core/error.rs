use rusqlite;
use std::io;
use thiserror::Error;

/// Failure taxonomy for the runtime.
///
/// Authorization failures (`NotController`, `NotOwner`, `NotAdmin`,
/// `NotMember`) and state conflicts (`AlreadyMember`, `AlreadyVoted`,
/// `AlreadyTerminated`, `SelectorAlreadyMapped`) always abort the whole
/// call: the broker rolls the transaction back, so no partial effect is
/// ever visible. State conflicts are safe to retry after re-reading.
#[derive(Error, Debug)]
pub enum HydraError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Must be controller")]
    NotController,
    #[error("Selector already mapped: {0}")]
    SelectorAlreadyMapped(String),
    #[error("Selector not mapped: {0}")]
    SelectorNotMapped(String),
    #[error("Function not found: {0}")]
    FunctionNotFound(String),
    #[error("Only owner can perform this action")]
    NotOwner,
    #[error("Only owner or admin can perform this action")]
    NotAdmin,
    #[error("Not a member of this AAO")]
    NotMember,
    #[error("Already a member of this AAO")]
    AlreadyMember,
    #[error("Already voted")]
    AlreadyVoted,
    #[error("AAO already terminated")]
    AlreadyTerminated,
    #[error("AAO is not active")]
    OrganizationInactive,
    #[error("Parent Macro AAO does not exist")]
    ParentMacroAAODoesNotExist,
    #[error("Parent AAO must be a Macro AAO")]
    ParentAAOMustBeAMacroAAO,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
}
