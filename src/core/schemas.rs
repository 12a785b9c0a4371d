//! Centralized schema definitions for the Hydra ledger.
//!
//! Hydra keeps ALL state in one SQLite database (`ledger.db`). Each
//! module owns a disjoint set of tables in it; the registry owns
//! `selectors` and `meta`. Storage disjointness between modules is
//! table ownership, enforced by construction here rather than by
//! runtime checks.

pub const LEDGER_DB_NAME: &str = "ledger.db";
pub const BROKER_EVENTS_NAME: &str = "broker.events.jsonl";

// --- Registry-owned tables ---

/// Selector table: one row per routable operation. `selector` is the
/// 4-byte hex fingerprint of the operation name; `module` is the
/// address of the module that implements it.
pub const REGISTRY_SCHEMA_SELECTORS: &str = "
    CREATE TABLE IF NOT EXISTS selectors (
        selector TEXT PRIMARY KEY,
        operation TEXT NOT NULL UNIQUE,
        module TEXT NOT NULL
    )
";

pub const REGISTRY_INDEX_SELECTORS_MODULE: &str =
    "CREATE INDEX IF NOT EXISTS idx_selectors_module ON selectors(module)";

/// Controller identity plus the dense monotonic id counters. The
/// counters are global (not per-organization): external callers address
/// organizations and proposals as 0, 1, 2, … in creation order.
pub const REGISTRY_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

// --- Governance-module tables (AAO ledger) ---

pub const AAO_SCHEMA_AAOS: &str = "
    CREATE TABLE IF NOT EXISTS aaos (
        id INTEGER PRIMARY KEY,
        topic TEXT NOT NULL,
        owner TEXT NOT NULL,
        duration INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        active INTEGER NOT NULL DEFAULT 1,
        is_macro INTEGER NOT NULL,
        parent_id INTEGER,
        FOREIGN KEY(parent_id) REFERENCES aaos(id)
    )
";

pub const AAO_SCHEMA_MEMBERS: &str = "
    CREATE TABLE IF NOT EXISTS aao_members (
        aao_id INTEGER NOT NULL,
        address TEXT NOT NULL,
        joined_at TEXT NOT NULL,
        PRIMARY KEY(aao_id, address),
        FOREIGN KEY(aao_id) REFERENCES aaos(id)
    )
";

pub const AAO_SCHEMA_ADMINS: &str = "
    CREATE TABLE IF NOT EXISTS aao_admins (
        aao_id INTEGER NOT NULL,
        address TEXT NOT NULL,
        assigned_at TEXT NOT NULL,
        PRIMARY KEY(aao_id, address),
        FOREIGN KEY(aao_id) REFERENCES aaos(id)
    )
";

pub const AAO_SCHEMA_PROPOSALS: &str = "
    CREATE TABLE IF NOT EXISTS proposals (
        id INTEGER PRIMARY KEY,
        aao_id INTEGER NOT NULL,
        proposer TEXT NOT NULL,
        text TEXT NOT NULL,
        for_votes INTEGER NOT NULL DEFAULT 0,
        against_votes INTEGER NOT NULL DEFAULT 0,
        status TEXT NOT NULL DEFAULT 'active',
        created_at TEXT NOT NULL,
        FOREIGN KEY(aao_id) REFERENCES aaos(id)
    )
";

pub const AAO_SCHEMA_VOTES: &str = "
    CREATE TABLE IF NOT EXISTS votes (
        proposal_id INTEGER NOT NULL,
        voter TEXT NOT NULL,
        support INTEGER NOT NULL,
        cast_at TEXT NOT NULL,
        PRIMARY KEY(proposal_id, voter),
        FOREIGN KEY(proposal_id) REFERENCES proposals(id)
    )
";

pub const AAO_SCHEMA_TASKS: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id INTEGER PRIMARY KEY,
        aao_id INTEGER NOT NULL,
        description TEXT NOT NULL,
        reward INTEGER NOT NULL,
        assignee TEXT,
        status TEXT NOT NULL DEFAULT 'open',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        FOREIGN KEY(aao_id) REFERENCES aaos(id)
    )
";

pub const AAO_INDEX_MEMBERS_ADDRESS: &str =
    "CREATE INDEX IF NOT EXISTS idx_aao_members_address ON aao_members(address)";
pub const AAO_INDEX_AAOS_OWNER: &str =
    "CREATE INDEX IF NOT EXISTS idx_aaos_owner ON aaos(owner)";
pub const AAO_INDEX_PROPOSALS_AAO: &str =
    "CREATE INDEX IF NOT EXISTS idx_proposals_aao ON proposals(aao_id)";
pub const AAO_INDEX_TASKS_AAO: &str =
    "CREATE INDEX IF NOT EXISTS idx_tasks_aao ON tasks(aao_id)";

// --- Token-module tables ---

pub const TOKEN_SCHEMA_TOKENS: &str = "
    CREATE TABLE IF NOT EXISTS tokens (
        address TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        symbol TEXT NOT NULL,
        registered_at TEXT NOT NULL
    )
";

// --- Shared event journal ---

/// Every successful mutation appends one row here: AAOCreated,
/// VoteCast, ModulesMutated, … Read-only operations never write.
pub const LEDGER_SCHEMA_EVENTS: &str = "
    CREATE TABLE IF NOT EXISTS ledger_events (
        event_id TEXT PRIMARY KEY,
        ts TEXT NOT NULL,
        event_type TEXT NOT NULL,
        subject_id TEXT,
        payload TEXT NOT NULL,
        actor TEXT NOT NULL
    )
";

pub const LEDGER_INDEX_EVENTS_TYPE: &str =
    "CREATE INDEX IF NOT EXISTS idx_ledger_events_type ON ledger_events(event_type)";

/// Full schema in creation order.
pub const LEDGER_DB_SCHEMA: &[&str] = &[
    REGISTRY_SCHEMA_SELECTORS,
    REGISTRY_INDEX_SELECTORS_MODULE,
    REGISTRY_SCHEMA_META,
    AAO_SCHEMA_AAOS,
    AAO_SCHEMA_MEMBERS,
    AAO_SCHEMA_ADMINS,
    AAO_SCHEMA_PROPOSALS,
    AAO_SCHEMA_VOTES,
    AAO_SCHEMA_TASKS,
    AAO_INDEX_MEMBERS_ADDRESS,
    AAO_INDEX_AAOS_OWNER,
    AAO_INDEX_PROPOSALS_AAO,
    AAO_INDEX_TASKS_AAO,
    TOKEN_SCHEMA_TOKENS,
    LEDGER_SCHEMA_EVENTS,
    LEDGER_INDEX_EVENTS_TYPE,
];
