//! Hydra: a pluggable governance runtime.
//!
//! **One identity, many swappable heads.**
//!
//! Hydra hosts a multi-tenant governance application behind a single
//! stable identity. Operations are routed through a selector table to
//! independently swappable modules; every module executes against one
//! shared persistent ledger, so replacing a module never strands state.
//!
//! # Core Principles
//!
//! - **Single state space**: all modules share `ledger.db`; each owns
//!   disjoint tables, checked by construction
//! - **Atomic mutation**: registry cuts and governance calls commit
//!   fully or roll back fully, one transaction per call
//! - **Controller-gated upgrades**: only the controller identity may
//!   mutate the selector table or transfer control
//! - **Auditable**: every brokered call leaves a `broker.events.jsonl`
//!   record; every successful mutation an event row
//!
//! # Architecture
//!
//! ## The Thin Waist
//!
//! All ledger access routes through `DbBroker` for serialization,
//! transactional rollback, and audit logging.
//!
//! ## Modules
//!
//! - `aao/v1`: organization ledger — lifecycle, membership, admin
//!   roles, proposals/votes, bounty tasks
//! - `macro-factory/v1` / `micro-factory/v1`: hierarchy-validated
//!   organization creation
//! - `token/v1`: controller-gated token metadata registry
//! - `genesis-init/v1`: one-shot bootstrap hook, never routed
//!
//! # Examples
//!
//! ```bash
//! # Initialize a Hydra project (seeds controller, applies genesis cut)
//! hydra init --controller operator
//!
//! # Create an organization and govern it
//! hydra aao create --caller alice --topic "Test Macro AAO" --duration 2592000
//! hydra aao join --caller bob --id 0
//! hydra proposal submit --caller bob --id 0 --text "Add a new feature"
//! hydra proposal vote --caller bob --id 0 --support true
//!
//! # Inspect the selector table
//! hydra registry list
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: store, broker, registry, config, error taxonomy
//! - [`modules`]: module trait, catalog, and built-in implementations
//! - [`runtime`]: dispatch binding table + catalog + store

pub mod core;
pub mod modules;
pub mod runtime;

use crate::core::config::HydraConfig;
use crate::core::registry::{self, CutAction, ModuleAddress, ModuleCut};
use crate::core::store::Store;
use crate::core::{db, error, schemas, time};
use crate::runtime::Runtime;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "hydra",
    version = env!("CARGO_PKG_VERSION"),
    about = "Hydra is a pluggable governance runtime: one stable identity, swappable operation modules, and a single shared ledger."
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap a project: store, controller, genesis cut
    #[clap(name = "init", visible_alias = "i")]
    Init(InitCli),

    /// Selector table: mutate, inspect, transfer control
    #[clap(name = "registry", visible_alias = "r")]
    Registry(RegistryCli),

    /// Organizations: lifecycle, membership, admin roles
    #[clap(name = "aao", visible_alias = "a")]
    Aao(AaoCli),

    /// Proposals and voting
    #[clap(name = "proposal", visible_alias = "p")]
    Proposal(ProposalCli),

    /// Bounty tasks
    #[clap(name = "task", visible_alias = "t")]
    Task(TaskCli),

    /// Token metadata registry
    #[clap(name = "token")]
    Token(TokenCli),

    /// Dispatch a raw operation through the selector table
    #[clap(name = "call")]
    Call {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        op: String,
        /// JSON payload for the operation.
        #[clap(long, default_value = "{}")]
        payload: String,
    },

    /// Show the audit log of brokered calls
    #[clap(name = "audit")]
    Audit,

    /// Subsystem schemas and discovery
    #[clap(name = "schema")]
    Schema,

    /// Show version information
    #[clap(name = "version")]
    Version,
}

#[derive(clap::Args, Debug)]
struct InitCli {
    /// Directory to initialize (defaults to current working directory).
    #[clap(short, long)]
    dir: Option<PathBuf>,
    /// Controller identity seeded into the registry.
    #[clap(long, default_value = "operator")]
    controller: String,
    /// Re-initialize even if `.hydra` already exists.
    #[clap(long)]
    force: bool,
}

#[derive(clap::Args, Debug)]
struct RegistryCli {
    #[clap(subcommand)]
    command: RegistryCommand,
}

#[derive(Subcommand, Debug)]
enum RegistryCommand {
    /// Apply one selector-table cut (controller only).
    Mutate {
        #[clap(long)]
        caller: String,
        /// add | replace | remove
        #[clap(long)]
        action: String,
        /// Module address; omit (or empty) for remove.
        #[clap(long, default_value = "")]
        module: String,
        /// Operation names, repeatable.
        #[clap(long = "op", required = true)]
        operations: Vec<String>,
        /// Init module address to run after the cut.
        #[clap(long)]
        init_module: Option<String>,
        /// JSON payload for the init hook.
        #[clap(long, default_value = "null")]
        init_data: String,
    },
    /// List every module with its routed operations.
    List,
    /// Resolve one operation to its module address.
    Resolve {
        #[clap(long)]
        op: String,
    },
    /// Transfer control to a new identity (controller only).
    Transfer {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        to: String,
    },
}

#[derive(clap::Args, Debug)]
struct AaoCli {
    #[clap(subcommand)]
    command: AaoCommand,
}

#[derive(Subcommand, Debug)]
enum AaoCommand {
    /// Create an organization (a Macro AAO, or a Micro with --parent).
    Create {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        topic: String,
        /// Duration in seconds.
        #[clap(long)]
        duration: u64,
        /// Parent Macro AAO id; makes this a Micro AAO.
        #[clap(long)]
        parent: Option<u64>,
    },
    /// Modify topic/duration (owner only).
    Modify {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
        #[clap(long)]
        topic: String,
        #[clap(long)]
        duration: u64,
    },
    /// Terminate an organization (owner only, terminal).
    Terminate {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
    },
    /// Join an active organization.
    Join {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
    },
    /// Leave an organization (owner cannot).
    Leave {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
    },
    /// Assign an admin role (owner or admin).
    AssignAdmin {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
        #[clap(long)]
        address: String,
    },
    /// Revoke an admin role (owner only).
    RevokeAdmin {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
        #[clap(long)]
        address: String,
    },
    /// Get one organization.
    Get {
        #[clap(long)]
        id: u64,
    },
    /// Membership / admin checks and listings.
    IsMember {
        #[clap(long)]
        id: u64,
        #[clap(long)]
        address: String,
    },
    IsAdmin {
        #[clap(long)]
        id: u64,
        #[clap(long)]
        address: String,
    },
    MembersCount {
        #[clap(long)]
        id: u64,
    },
    ByCreator {
        #[clap(long)]
        address: String,
    },
    ByMember {
        #[clap(long)]
        address: String,
    },
    Count,
    /// Parent Macro AAO of a Micro AAO.
    Parent {
        #[clap(long)]
        id: u64,
    },
}

#[derive(clap::Args, Debug)]
struct ProposalCli {
    #[clap(subcommand)]
    command: ProposalCommand,
}

#[derive(Subcommand, Debug)]
enum ProposalCommand {
    /// Submit a proposal to an organization (members only).
    Submit {
        #[clap(long)]
        caller: String,
        /// Organization id.
        #[clap(long)]
        id: u64,
        #[clap(long)]
        text: String,
    },
    /// Vote on a proposal (members only, once).
    Vote {
        #[clap(long)]
        caller: String,
        /// Proposal id.
        #[clap(long)]
        id: u64,
        #[clap(long)]
        support: bool,
    },
    /// Close out a proposal under the configured quorum policy.
    Execute {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
    },
    /// Get one proposal.
    Get {
        #[clap(long)]
        id: u64,
    },
}

#[derive(clap::Args, Debug)]
struct TaskCli {
    #[clap(subcommand)]
    command: TaskCommand,
}

#[derive(Subcommand, Debug)]
enum TaskCommand {
    /// Post a bounty task (owner/admin only).
    Create {
        #[clap(long)]
        caller: String,
        /// Organization id.
        #[clap(long)]
        id: u64,
        #[clap(long)]
        description: String,
        #[clap(long)]
        reward: u64,
    },
    /// Claim an open task (members only).
    Assign {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
    },
    /// Mark an assigned task completed (assignee only).
    Complete {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
    },
    /// Verify or reject a completed task (owner/admin only).
    Verify {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        id: u64,
        #[clap(long)]
        approved: bool,
    },
    /// Get one task.
    Get {
        #[clap(long)]
        id: u64,
    },
}

#[derive(clap::Args, Debug)]
struct TokenCli {
    #[clap(subcommand)]
    command: TokenCommand,
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
    /// Register token metadata (controller only).
    Register {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        address: String,
        #[clap(long)]
        name: String,
        #[clap(long)]
        symbol: String,
    },
    /// Deregister a token (controller only).
    Deregister {
        #[clap(long)]
        caller: String,
        #[clap(long)]
        address: String,
    },
    /// Get one token's metadata.
    Info {
        #[clap(long)]
        address: String,
    },
    /// List all registered tokens.
    List,
}

fn find_hydra_project_root(start_dir: &Path) -> Result<PathBuf, error::HydraError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(".hydra").exists() {
            return Ok(current_dir);
        }
        if !current_dir.pop() {
            return Err(error::HydraError::NotFound(
                "'.hydra' directory not found in current or parent directories. Run `hydra init` first.".to_string(),
            ));
        }
    }
}

fn print_envelope(cmd: &str, result: serde_json::Value) {
    let envelope = time::command_envelope(cmd, "ok", serde_json::json!({ "result": result }));
    println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
}

fn run_init(cli: InitCli, current_dir: &Path) -> Result<(), error::HydraError> {
    let target_dir = match cli.dir {
        Some(d) => d,
        None => current_dir.to_path_buf(),
    };
    let target_dir = fs::canonicalize(&target_dir).map_err(error::HydraError::IoError)?;

    let hydra_root = target_dir.join(".hydra");
    if hydra_root.exists() && !cli.force {
        println!(
            "{} .hydra already exists in {} (use --force to re-initialize)",
            "⚠".bright_yellow(),
            target_dir.display()
        );
        return Ok(());
    }

    let store_root = hydra_root.join("data");
    fs::create_dir_all(&store_root).map_err(error::HydraError::IoError)?;

    let ledger_existed = db::ledger_db_path(&store_root).exists();
    db::initialize_ledger_db(&store_root)?;
    if ledger_existed {
        println!(
            "    {} {} {}",
            "✓".bright_green(),
            schemas::LEDGER_DB_NAME.bright_white(),
            "(preserved - existing data kept)".bright_black()
        );
    } else {
        println!(
            "    {} {}",
            "●".bright_green(),
            schemas::LEDGER_DB_NAME.bright_white()
        );
    }

    let store = Store::new(store_root);
    let config = HydraConfig::load(&target_dir)?;
    let rt = Runtime::open(store, &config);

    if !ledger_existed {
        registry::initialize_registry(rt.store(), &cli.controller)?;
        rt.genesis_cut(&cli.controller)?;
        println!(
            "    {} controller seeded: {}",
            "●".bright_green(),
            cli.controller.bright_white()
        );
        println!("    {} genesis cut applied", "●".bright_green());
    }

    println!(
        "{} Hydra initialized in {}",
        "✓".bright_green(),
        target_dir.display()
    );
    Ok(())
}

pub fn run() -> Result<(), error::HydraError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Version => {
            println!("v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Init(init_cli) => {
            return run_init(init_cli, &current_dir);
        }
        _ => {}
    }

    let project_root = find_hydra_project_root(&current_dir)?;
    let store_root = project_root.join(".hydra").join("data");
    let store = Store::new(store_root.clone());
    let config = HydraConfig::load(&project_root)?;
    let rt = Runtime::open(store, &config);

    match cli.command {
        Command::Registry(registry_cli) => match registry_cli.command {
            RegistryCommand::Mutate {
                caller,
                action,
                module,
                operations,
                init_module,
                init_data,
            } => {
                let action = match action.as_str() {
                    "add" => CutAction::Add,
                    "replace" => CutAction::Replace,
                    "remove" => CutAction::Remove,
                    other => {
                        return Err(error::HydraError::ValidationError(format!(
                            "unknown cut action: {}",
                            other
                        )))
                    }
                };
                let cuts = vec![ModuleCut {
                    module: ModuleAddress::new(module),
                    action,
                    operations,
                }];
                let init = match init_module {
                    Some(addr) => {
                        let payload = serde_json::from_str(&init_data).map_err(|e| {
                            error::HydraError::ValidationError(format!("invalid init data: {}", e))
                        })?;
                        Some((ModuleAddress::new(addr), payload))
                    }
                    None => None,
                };
                rt.mutate_modules(&caller, &cuts, init)?;
                print_envelope("registry.mutate", serde_json::json!({ "applied": cuts.len() }));
            }
            RegistryCommand::List => {
                let records = registry::all_modules(rt.store())?;
                print_envelope(
                    "registry.list",
                    serde_json::to_value(records).unwrap_or_default(),
                );
            }
            RegistryCommand::Resolve { op } => {
                let module = registry::module_for(rt.store(), &op)?;
                print_envelope(
                    "registry.resolve",
                    serde_json::json!({ "operation": op, "module": module }),
                );
            }
            RegistryCommand::Transfer { caller, to } => {
                registry::transfer_control(rt.store(), &caller, &to)?;
                print_envelope("registry.transfer", serde_json::json!({ "controller": to }));
            }
        },
        Command::Aao(aao_cli) => {
            let (caller, op, payload) = match aao_cli.command {
                AaoCommand::Create {
                    caller,
                    topic,
                    duration,
                    parent,
                } => (
                    caller,
                    "createAAO",
                    serde_json::json!({ "topic": topic, "duration": duration, "parent_id": parent }),
                ),
                AaoCommand::Modify {
                    caller,
                    id,
                    topic,
                    duration,
                } => (
                    caller,
                    "modifyAAO",
                    serde_json::json!({ "aao_id": id, "topic": topic, "duration": duration }),
                ),
                AaoCommand::Terminate { caller, id } => {
                    (caller, "terminateAAO", serde_json::json!({ "aao_id": id }))
                }
                AaoCommand::Join { caller, id } => {
                    (caller, "joinAAO", serde_json::json!({ "aao_id": id }))
                }
                AaoCommand::Leave { caller, id } => {
                    (caller, "leaveAAO", serde_json::json!({ "aao_id": id }))
                }
                AaoCommand::AssignAdmin {
                    caller,
                    id,
                    address,
                } => (
                    caller,
                    "assignAdminRole",
                    serde_json::json!({ "aao_id": id, "address": address }),
                ),
                AaoCommand::RevokeAdmin {
                    caller,
                    id,
                    address,
                } => (
                    caller,
                    "revokeAdminRole",
                    serde_json::json!({ "aao_id": id, "address": address }),
                ),
                AaoCommand::Get { id } => (
                    "hydra".to_string(),
                    "getAAO",
                    serde_json::json!({ "aao_id": id }),
                ),
                AaoCommand::IsMember { id, address } => (
                    "hydra".to_string(),
                    "isMember",
                    serde_json::json!({ "aao_id": id, "address": address }),
                ),
                AaoCommand::IsAdmin { id, address } => (
                    "hydra".to_string(),
                    "isAdmin",
                    serde_json::json!({ "aao_id": id, "address": address }),
                ),
                AaoCommand::MembersCount { id } => (
                    "hydra".to_string(),
                    "getMembersCount",
                    serde_json::json!({ "aao_id": id }),
                ),
                AaoCommand::ByCreator { address } => (
                    "hydra".to_string(),
                    "getAAOsByCreator",
                    serde_json::json!({ "address": address }),
                ),
                AaoCommand::ByMember { address } => (
                    "hydra".to_string(),
                    "getAAOsByMember",
                    serde_json::json!({ "address": address }),
                ),
                AaoCommand::Count => (
                    "hydra".to_string(),
                    "getTotalAAOCount",
                    serde_json::json!({}),
                ),
                AaoCommand::Parent { id } => (
                    "hydra".to_string(),
                    "getMacroAAOId",
                    serde_json::json!({ "aao_id": id }),
                ),
            };
            let result = rt.dispatch(&caller, op, &payload)?;
            print_envelope(&format!("aao.{}", op), result);
        }
        Command::Proposal(proposal_cli) => {
            let (caller, op, payload) = match proposal_cli.command {
                ProposalCommand::Submit { caller, id, text } => (
                    caller,
                    "submitProposal",
                    serde_json::json!({ "aao_id": id, "text": text }),
                ),
                ProposalCommand::Vote {
                    caller,
                    id,
                    support,
                } => (
                    caller,
                    "vote",
                    serde_json::json!({ "proposal_id": id, "support": support }),
                ),
                ProposalCommand::Execute { caller, id } => (
                    caller,
                    "executeProposal",
                    serde_json::json!({ "proposal_id": id }),
                ),
                ProposalCommand::Get { id } => (
                    "hydra".to_string(),
                    "getProposal",
                    serde_json::json!({ "proposal_id": id }),
                ),
            };
            let result = rt.dispatch(&caller, op, &payload)?;
            print_envelope(&format!("proposal.{}", op), result);
        }
        Command::Task(task_cli) => {
            let (caller, op, payload) = match task_cli.command {
                TaskCommand::Create {
                    caller,
                    id,
                    description,
                    reward,
                } => (
                    caller,
                    "createBounty",
                    serde_json::json!({ "aao_id": id, "description": description, "reward": reward }),
                ),
                TaskCommand::Assign { caller, id } => {
                    (caller, "assignTask", serde_json::json!({ "task_id": id }))
                }
                TaskCommand::Complete { caller, id } => {
                    (caller, "completeTask", serde_json::json!({ "task_id": id }))
                }
                TaskCommand::Verify {
                    caller,
                    id,
                    approved,
                } => (
                    caller,
                    "verifyTask",
                    serde_json::json!({ "task_id": id, "approved": approved }),
                ),
                TaskCommand::Get { id } => (
                    "hydra".to_string(),
                    "getTask",
                    serde_json::json!({ "task_id": id }),
                ),
            };
            let result = rt.dispatch(&caller, op, &payload)?;
            print_envelope(&format!("task.{}", op), result);
        }
        Command::Token(token_cli) => {
            let (caller, op, payload) = match token_cli.command {
                TokenCommand::Register {
                    caller,
                    address,
                    name,
                    symbol,
                } => (
                    caller,
                    "registerToken",
                    serde_json::json!({ "address": address, "name": name, "symbol": symbol }),
                ),
                TokenCommand::Deregister { caller, address } => (
                    caller,
                    "deregisterToken",
                    serde_json::json!({ "address": address }),
                ),
                TokenCommand::Info { address } => (
                    "hydra".to_string(),
                    "getTokenInfo",
                    serde_json::json!({ "address": address }),
                ),
                TokenCommand::List => (
                    "hydra".to_string(),
                    "getRegisteredTokens",
                    serde_json::json!({}),
                ),
            };
            let result = rt.dispatch(&caller, op, &payload)?;
            print_envelope(&format!("token.{}", op), result);
        }
        Command::Call {
            caller,
            op,
            payload,
        } => {
            let payload: serde_json::Value = serde_json::from_str(&payload).map_err(|e| {
                error::HydraError::ValidationError(format!("invalid payload: {}", e))
            })?;
            let result = rt.dispatch(&caller, &op, &payload)?;
            print_envelope(&format!("call.{}", op), result);
        }
        Command::Audit => {
            let audit_log = store_root.join(schemas::BROKER_EVENTS_NAME);
            if audit_log.exists() {
                let content = fs::read_to_string(audit_log)?;
                print!("{}", content);
            } else {
                println!("No audit log found.");
            }
        }
        Command::Schema => {
            let mut subsystems = std::collections::BTreeMap::new();
            subsystems.insert("broker", crate::core::broker::schema());
            subsystems.insert("modules", crate::modules::schema());
            subsystems.insert("aao", crate::modules::aao::schema());
            subsystems.insert("token", crate::modules::token::schema());
            let envelope = serde_json::json!({
                "schema_version": "1.0.0",
                "subsystems": subsystems
            });
            println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
        }
        Command::Init(_) | Command::Version => unreachable!(),
    }
    Ok(())
}
